//! Export surfaces bound to a record store
//!
//! [`ExportableModel`] pairs a store with its compiled mapping and builds the
//! export query from the caller's filter. [`ExportQuery`] and
//! [`ExportAggregate`] export a query or pipeline the caller already built.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use bson::{Document, doc};
use tokio::io::AsyncWrite;
use tracing::debug;

use crate::config::ExportSettings;
use crate::error::Result;
use crate::schema::{DescriptorMapping, ExportableRegistry, FieldTree};

use super::coordinator::{self, Exported};
use super::options::{ExportOptions, QueryFilter};
use super::pipeline::{CsvStream, ExportSummary};
use super::source::{ExportSource, FindSpec, RecordStore};

/// Free-text search capability of a model
pub trait SearchFilter: Send + Sync {
    /// Build the query document for `q` combined with `conditions`
    fn search(&self, q: Option<&str>, conditions: Document) -> Document;
}

/// Search through the store's text index (`$text`)
#[derive(Debug, Clone, Copy, Default)]
pub struct TextIndexSearch;

impl SearchFilter for TextIndexSearch {
    fn search(&self, q: Option<&str>, conditions: Document) -> Document {
        match q.map(str::trim).filter(|q| !q.is_empty()) {
            Some(q) => {
                let mut filter = doc! { "$text": { "$search": q } };
                for (key, value) in conditions {
                    filter.insert(key, value);
                }
                filter
            }
            None => conditions,
        }
    }
}

/// A record store with an attached exportable mapping
#[derive(Clone)]
pub struct ExportableModel {
    store: Arc<dyn RecordStore>,
    mapping: Arc<DescriptorMapping>,
    search: Option<Arc<dyn SearchFilter>>,
    settings: ExportSettings,
}

impl ExportableModel {
    pub fn new(
        store: Arc<dyn RecordStore>,
        mapping: Arc<DescriptorMapping>,
        settings: ExportSettings,
    ) -> Self {
        Self {
            store,
            mapping,
            search: None,
            settings,
        }
    }

    /// Attach export to a store, compiling `tree` unless already attached
    ///
    /// The registry is keyed by the store name.
    pub fn attach(
        registry: &ExportableRegistry,
        store: Arc<dyn RecordStore>,
        tree: &dyn FieldTree,
        settings: ExportSettings,
    ) -> Self {
        let mapping = registry.attach(store.name(), tree);
        Self::new(store, mapping, settings)
    }

    /// Enable free-text search for the `q` filter key
    pub fn with_search(mut self, search: impl SearchFilter + 'static) -> Self {
        self.search = Some(Arc::new(search));
        self
    }

    pub fn name(&self) -> &str {
        self.store.name()
    }

    pub fn mapping(&self) -> &DescriptorMapping {
        &self.mapping
    }

    pub fn settings(&self) -> &ExportSettings {
        &self.settings
    }

    /// Query document for a model export filter
    ///
    /// Goes through the search capability when there is one; otherwise `q`
    /// is ignored and the conditions are used as an equality filter.
    pub fn build_filter(&self, filter: Option<QueryFilter>) -> Document {
        let QueryFilter { q, conditions } = filter.unwrap_or_default();
        match &self.search {
            Some(search) => search.search(q.as_deref(), conditions),
            None => conditions,
        }
    }

    /// Sort used when an export gives none
    pub fn default_sort(&self) -> Document {
        let mut sort = Document::new();
        sort.insert(self.settings.default_sort_field.clone(), -1);
        sort
    }

    /// Start a query export over `filter`
    pub fn find(&self, filter: Document) -> ExportQuery {
        ExportQuery {
            store: self.store.clone(),
            mapping: self.mapping.clone(),
            settings: self.settings.clone(),
            filter,
            spec: FindSpec::default(),
        }
    }

    /// Start an aggregation export over `pipeline`
    pub fn aggregate(&self, pipeline: Vec<Document>) -> ExportAggregate {
        ExportAggregate {
            store: self.store.clone(),
            mapping: self.mapping.clone(),
            settings: self.settings.clone(),
            pipeline,
        }
    }

    fn source(&self, options: &mut ExportOptions) -> ExportSource {
        let filter = self.build_filter(options.filter.take());
        let sort = options.sort.take().unwrap_or_else(|| self.default_sort());
        debug!("Model export on '{}': filter {:?}, sort {:?}", self.name(), filter, sort);

        ExportSource::Find {
            store: self.store.clone(),
            filter,
            spec: FindSpec {
                sort: Some(sort),
                batch_size: Some(self.settings.batch_size),
                ..FindSpec::default()
            },
        }
    }

    /// Export the model's records as a CSV stream
    pub fn export_csv(&self, mut options: ExportOptions) -> CsvStream {
        let source = self.source(&mut options);
        coordinator::export_csv(source, &self.mapping, &self.settings, options)
    }

    /// Export the model's records into `sink`
    pub async fn export_csv_to<W>(&self, mut options: ExportOptions, sink: W) -> Result<Exported<W>>
    where
        W: AsyncWrite + Unpin + Send,
    {
        let source = self.source(&mut options);
        coordinator::export_csv_to(source, &self.mapping, &self.settings, options, sink).await
    }

    /// Export the model's records into a new file
    pub async fn export_csv_to_file(
        &self,
        mut options: ExportOptions,
        path: impl AsRef<Path>,
    ) -> Result<ExportSummary> {
        let source = self.source(&mut options);
        coordinator::export_csv_to_file(source, &self.mapping, &self.settings, options, path.as_ref())
            .await
    }
}

impl fmt::Debug for ExportableModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportableModel")
            .field("store", &self.store.name())
            .field("mapping", &self.mapping.paths())
            .field("search", &self.search.is_some())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Find query ready for export
#[derive(Clone)]
pub struct ExportQuery {
    store: Arc<dyn RecordStore>,
    mapping: Arc<DescriptorMapping>,
    settings: ExportSettings,
    filter: Document,
    spec: FindSpec,
}

impl ExportQuery {
    pub fn sort(mut self, sort: Document) -> Self {
        self.spec.sort = Some(sort);
        self
    }

    pub fn limit(mut self, limit: i64) -> Self {
        self.spec.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.spec.skip = Some(skip);
        self
    }

    fn source(&self) -> ExportSource {
        let mut spec = self.spec.clone();
        spec.batch_size.get_or_insert(self.settings.batch_size);

        ExportSource::Find {
            store: self.store.clone(),
            filter: self.filter.clone(),
            spec,
        }
    }

    /// Export the query results as a CSV stream
    pub fn export_csv(&self, options: ExportOptions) -> CsvStream {
        coordinator::export_csv(self.source(), &self.mapping, &self.settings, options)
    }

    /// Export the query results into `sink`
    pub async fn export_csv_to<W>(&self, options: ExportOptions, sink: W) -> Result<Exported<W>>
    where
        W: AsyncWrite + Unpin + Send,
    {
        coordinator::export_csv_to(self.source(), &self.mapping, &self.settings, options, sink).await
    }

    /// Export the query results into a new file
    pub async fn export_csv_to_file(
        &self,
        options: ExportOptions,
        path: impl AsRef<Path>,
    ) -> Result<ExportSummary> {
        coordinator::export_csv_to_file(
            self.source(),
            &self.mapping,
            &self.settings,
            options,
            path.as_ref(),
        )
        .await
    }
}

/// Aggregation pipeline ready for export
#[derive(Clone)]
pub struct ExportAggregate {
    store: Arc<dyn RecordStore>,
    mapping: Arc<DescriptorMapping>,
    settings: ExportSettings,
    pipeline: Vec<Document>,
}

impl ExportAggregate {
    /// Append a stage
    pub fn stage(mut self, stage: Document) -> Self {
        self.pipeline.push(stage);
        self
    }

    pub fn pipeline(&self) -> &[Document] {
        &self.pipeline
    }

    fn source(&self) -> ExportSource {
        ExportSource::Aggregate {
            store: self.store.clone(),
            pipeline: self.pipeline.clone(),
            batch_size: Some(self.settings.batch_size),
        }
    }

    /// Export the pipeline output as a CSV stream
    pub fn export_csv(&self, options: ExportOptions) -> CsvStream {
        coordinator::export_csv(self.source(), &self.mapping, &self.settings, options)
    }

    /// Export the pipeline output into `sink`
    pub async fn export_csv_to<W>(&self, options: ExportOptions, sink: W) -> Result<Exported<W>>
    where
        W: AsyncWrite + Unpin + Send,
    {
        coordinator::export_csv_to(self.source(), &self.mapping, &self.settings, options, sink).await
    }

    /// Export the pipeline output into a new file
    pub async fn export_csv_to_file(
        &self,
        options: ExportOptions,
        path: impl AsRef<Path>,
    ) -> Result<ExportSummary> {
        coordinator::export_csv_to_file(
            self.source(),
            &self.mapping,
            &self.settings,
            options,
            path.as_ref(),
        )
        .await
    }
}
