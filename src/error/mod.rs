//! Error handling for export operations.
//!
//! All failures an export can hit (source, formatter, serializer, sink)
//! converge on [`ExportableError`], so they can be delivered exactly once
//! through a completion callback or as the final item of a CSV stream.
//!
//! # Example
//!
//! ```rust
//! use mongo_exportable::error::{ExportableError, Result, SourceError};
//!
//! fn read_next() -> Result<()> {
//!     Err(SourceError::CursorError("connection reset".into()).into())
//! }
//!
//! assert!(matches!(read_next(), Err(ExportableError::Source(_))));
//! ```

pub mod kinds;
pub mod mongo;

// Re-export commonly used types
pub use kinds::{BoxError, ConfigError, ExportableError, Result, SourceError};
pub use mongo::ErrorInfo;
