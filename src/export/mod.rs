//! Streaming CSV export
//!
//! The export system chains four stages, each pulled by the next:
//!
//! 1. **ExportSource**: opens a find, an aggregation or a caller-supplied
//!    stream, restricted to the exported paths
//! 2. **RecordTransformer**: formats each record into an output row keyed by
//!    column header
//! 3. **CsvSerializer**: encodes rows, emitting the header with the first one
//! 4. **Sink** (optional): receives the encoded chunks via `export_csv_to`
//!
//! [`CsvStream`] is the pipeline itself; the coordinator functions and the
//! [`ExportableModel`] surfaces build it from [`ExportOptions`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bson::doc;
//! use mongo_exportable::config::Config;
//! use mongo_exportable::export::{ExportOptions, ExportableModel, MemoryStore};
//! use mongo_exportable::schema::{ExportableRegistry, FieldDef, Schema};
//!
//! # async fn run() -> mongo_exportable::Result<()> {
//! let config = Config::load(None)?;
//! let registry = ExportableRegistry::new(config.missing.clone());
//!
//! let schema = Schema::new()
//!     .field("name", FieldDef::string().exportable(true))
//!     .field("age", FieldDef::number().exportable(true));
//! let store = MemoryStore::new("users", vec![doc! { "name": "Amy", "age": 30 }]);
//!
//! let users = ExportableModel::attach(&registry, Arc::new(store), &schema, config.export);
//! let exported = users.export_csv_to(ExportOptions::new(), Vec::new()).await?;
//! assert_eq!(exported.sink, b"Name,Age\nAmy,30\n");
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod memory;
pub mod model;
pub mod options;
pub mod pipeline;
pub mod source;
pub mod transform;
pub mod writers;

pub use coordinator::{Exported, export_csv, export_csv_to, export_csv_to_file, write_csv};
pub use memory::MemoryStore;
pub use model::{ExportAggregate, ExportQuery, ExportableModel, SearchFilter, TextIndexSearch};
pub use options::{ExportOptions, QueryFilter};
pub use pipeline::{Completion, CompletionCallback, CsvStream, ExportSummary};
pub use source::{ExportSource, FindSpec, RecordStore, RecordStream};
pub use transform::RecordTransformer;
pub use writers::{CsvSerializer, default_filename};

#[cfg(test)]
pub(crate) mod testing {
    use std::pin::Pin;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::task::{Context, Poll};

    use futures::{Stream, StreamExt};

    /// Record stream that raises a flag once it has been dropped
    pub(crate) struct TrackedCursor<S> {
        inner: S,
        released: Arc<AtomicBool>,
    }

    impl<S> TrackedCursor<S> {
        pub(crate) fn new(inner: S) -> (Self, Arc<AtomicBool>) {
            let released = Arc::new(AtomicBool::new(false));
            let cursor = Self {
                inner,
                released: released.clone(),
            };
            (cursor, released)
        }
    }

    impl<S: Stream + Unpin> Stream for TrackedCursor<S> {
        type Item = S::Item;

        fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<S::Item>> {
            self.inner.poll_next_unpin(cx)
        }
    }

    impl<S> Drop for TrackedCursor<S> {
        fn drop(&mut self) {
            self.released.store(true, Ordering::SeqCst);
        }
    }
}
