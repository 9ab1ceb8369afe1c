//! Record sources feeding the export pipeline
//!
//! A [`RecordStore`] is anything that can run a find or an aggregation and
//! hand back a lazy record stream. [`ExportSource`] is one pending query
//! against a store (or an already-open stream) waiting for the pipeline to
//! supply its projection.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use bson::{Document, doc};
use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use mongodb::Collection;
use mongodb::options::{AggregateOptions, FindOptions};
use tracing::debug;

use crate::error::{ExportableError, Result, SourceError};
use crate::utils::path::project;

/// Lazy, ordered, pull-based record sequence
pub type RecordStream = BoxStream<'static, Result<Document>>;

/// Cursor options of a find
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindSpec {
    pub projection: Option<Document>,
    pub sort: Option<Document>,
    pub limit: Option<i64>,
    pub skip: Option<u64>,
    pub batch_size: Option<u32>,
}

/// Backing store able to run queries as record streams
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Store identity, used as the registry key of its mapping
    fn name(&self) -> &str;

    /// Open a cursor over the records matching `filter`
    ///
    /// # Arguments
    /// * `filter` - Query conditions
    /// * `spec` - Projection, sort and paging options
    ///
    /// # Returns
    /// * `Result<RecordStream>` - Lazy record stream or query error
    async fn find(&self, filter: Document, spec: FindSpec) -> Result<RecordStream>;

    /// Open a cursor over the output of an aggregation pipeline
    async fn aggregate(&self, pipeline: Vec<Document>, batch_size: Option<u32>)
    -> Result<RecordStream>;
}

#[async_trait]
impl RecordStore for Collection<Document> {
    fn name(&self) -> &str {
        Collection::name(self)
    }

    async fn find(&self, filter: Document, spec: FindSpec) -> Result<RecordStream> {
        let mut find_opts = FindOptions::default();
        find_opts.projection = spec.projection;
        find_opts.sort = spec.sort;
        find_opts.limit = spec.limit;
        find_opts.skip = spec.skip;
        find_opts.batch_size = spec.batch_size;

        debug!("Opening find cursor on '{}': {:?}", Collection::name(self), filter);

        let cursor = Collection::find(self, filter)
            .with_options(find_opts)
            .await?;

        Ok(cursor
            .map_err(|e| ExportableError::from(SourceError::CursorError(e.to_string())))
            .boxed())
    }

    async fn aggregate(
        &self,
        pipeline: Vec<Document>,
        batch_size: Option<u32>,
    ) -> Result<RecordStream> {
        let mut agg_opts = AggregateOptions::default();
        agg_opts.batch_size = batch_size;

        debug!(
            "Opening aggregate cursor on '{}' with {} stages",
            Collection::name(self),
            pipeline.len()
        );

        let cursor = Collection::aggregate(self, pipeline)
            .with_options(agg_opts)
            .await?;

        Ok(cursor
            .map_err(|e| ExportableError::from(SourceError::CursorError(e.to_string())))
            .boxed())
    }
}

/// One export's worth of records, not yet opened
pub enum ExportSource {
    /// Find against a store; the projection is filled in on open.
    Find {
        store: Arc<dyn RecordStore>,
        filter: Document,
        spec: FindSpec,
    },

    /// Aggregation against a store; a `$project` stage is appended on open.
    Aggregate {
        store: Arc<dyn RecordStore>,
        pipeline: Vec<Document>,
        batch_size: Option<u32>,
    },

    /// Already-open stream; the projection is applied in memory.
    Stream(RecordStream),
}

impl ExportSource {
    /// Find source with default cursor options
    pub fn find(store: Arc<dyn RecordStore>, filter: Document) -> Self {
        ExportSource::Find {
            store,
            filter,
            spec: FindSpec::default(),
        }
    }

    /// Aggregation source
    pub fn aggregate(store: Arc<dyn RecordStore>, pipeline: Vec<Document>) -> Self {
        ExportSource::Aggregate {
            store,
            pipeline,
            batch_size: None,
        }
    }

    /// Wrap any record stream
    pub fn stream<S>(stream: S) -> Self
    where
        S: futures::Stream<Item = Result<Document>> + Send + 'static,
    {
        ExportSource::Stream(stream.boxed())
    }

    /// Short label used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            ExportSource::Find { .. } => "find",
            ExportSource::Aggregate { .. } => "aggregate",
            ExportSource::Stream(_) => "stream",
        }
    }

    /// Open the cursor restricted to `projection`
    ///
    /// An empty projection leaves records untouched.
    pub async fn open(self, projection: Document) -> Result<RecordStream> {
        match self {
            ExportSource::Find {
                store,
                filter,
                mut spec,
            } => {
                if !projection.is_empty() {
                    spec.projection = Some(projection);
                }
                store.find(filter, spec).await
            }
            ExportSource::Aggregate {
                store,
                mut pipeline,
                batch_size,
            } => {
                if !projection.is_empty() {
                    pipeline.push(doc! { "$project": projection });
                }
                store.aggregate(pipeline, batch_size).await
            }
            ExportSource::Stream(stream) => {
                if projection.is_empty() {
                    Ok(stream)
                } else {
                    Ok(stream
                        .map_ok(move |record| project(&record, &projection))
                        .boxed())
                }
            }
        }
    }
}

impl fmt::Debug for ExportSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportSource::Find { store, filter, spec } => f
                .debug_struct("Find")
                .field("store", &store.name())
                .field("filter", filter)
                .field("spec", spec)
                .finish(),
            ExportSource::Aggregate {
                store,
                pipeline,
                batch_size,
            } => f
                .debug_struct("Aggregate")
                .field("store", &store.name())
                .field("pipeline", pipeline)
                .field("batch_size", batch_size)
                .finish(),
            ExportSource::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::memory::MemoryStore;
    use futures::stream;

    fn store() -> Arc<dyn RecordStore> {
        Arc::new(MemoryStore::new(
            "users",
            vec![
                doc! { "_id": 1, "name": "Amy", "age": 30, "secret": "x" },
                doc! { "_id": 2, "name": "Bo", "age": 41, "secret": "y" },
            ],
        ))
    }

    #[tokio::test]
    async fn test_find_source_applies_projection() {
        let source = ExportSource::find(store(), doc! { "name": "Bo" });
        let records: Vec<Document> = source
            .open(doc! { "name": 1 })
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records, vec![doc! { "_id": 2, "name": "Bo" }]);
    }

    #[tokio::test]
    async fn test_aggregate_source_appends_project_stage() {
        let source = ExportSource::aggregate(store(), vec![doc! { "$sort": { "age": -1 } }]);
        let records: Vec<Document> = source
            .open(doc! { "age": 1, "_id": 0 })
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(records, vec![doc! { "age": 41 }, doc! { "age": 30 }]);
    }

    #[tokio::test]
    async fn test_stream_source_projects_in_memory() {
        let records = stream::iter(vec![Ok(doc! { "a": 1, "b": { "c": 2, "d": 3 } })]);
        let projected: Vec<Document> = ExportSource::stream(records)
            .open(doc! { "b.c": 1 })
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();

        assert_eq!(projected, vec![doc! { "b": { "c": 2 } }]);
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(ExportSource::find(store(), doc! {}).kind(), "find");
        assert_eq!(ExportSource::aggregate(store(), vec![]).kind(), "aggregate");
        assert_eq!(ExportSource::stream(stream::empty()).kind(), "stream");
    }
}
