//! Per-export options

use std::fmt;

use bson::{Bson, Document};
use tokio_util::sync::CancellationToken;

use crate::schema::DescriptorMapping;

use super::pipeline::{Completion, CompletionCallback};

/// Model export filter: optional free-text query plus field conditions
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryFilter {
    /// Free-text search string
    pub q: Option<String>,
    /// Remaining field conditions
    pub conditions: Document,
}

impl QueryFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Free-text search string
    pub fn search(mut self, q: impl Into<String>) -> Self {
        self.q = Some(q.into());
        self
    }

    /// Field conditions
    pub fn conditions(mut self, conditions: Document) -> Self {
        self.conditions = conditions;
        self
    }

    /// Split a raw filter document into `q` and the other conditions
    ///
    /// A non-string `q` is dropped.
    pub fn from_document(mut filter: Document) -> Self {
        let q = match filter.remove("q") {
            Some(Bson::String(q)) => Some(q),
            _ => None,
        };

        Self {
            q,
            conditions: filter,
        }
    }
}

/// Options of a single export
///
/// `filter` and `sort` only apply to model exports; query and aggregation
/// exports already carry their own. `exportables` replaces the attached
/// mapping wholesale.
#[derive(Default)]
pub struct ExportOptions {
    pub filter: Option<QueryFilter>,
    pub sort: Option<Document>,
    pub exportables: Option<DescriptorMapping>,
    pub on_complete: Option<CompletionCallback>,
    pub cancel: Option<CancellationToken>,
}

impl ExportOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn sort(mut self, sort: Document) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Export these fields instead of the attached mapping
    pub fn exportables(mut self, mapping: DescriptorMapping) -> Self {
        self.exportables = Some(mapping);
        self
    }

    /// Callback invoked once with the summary or the error
    pub fn on_complete<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Completion<'_>) + Send + 'static,
    {
        self.on_complete = Some(Box::new(callback));
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

impl fmt::Debug for ExportOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportOptions")
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("exportables", &self.exportables.as_ref().map(|m| m.paths()))
            .field("on_complete", &self.on_complete.as_ref().map(|_| ".."))
            .field("cancel", &self.cancel)
            .finish()
    }
}
