//! Compiled per-field export descriptors

use std::fmt;

use bson::{Bson, Document};

use crate::error::{ExportableError, Result};
use crate::utils::path::last_segment;
use crate::utils::string::start_case;

use super::exportable::{FieldDefault, FieldExport, FormatFn, Formatted};

/// Order of fields that declare none; sorts after every explicit order
pub const UNORDERED: i64 = i64::MAX;

/// Export configuration of one field path
#[derive(Clone)]
pub struct ExportDescriptor {
    path: String,
    header: String,
    order: i64,
    default: Option<FieldDefault>,
    formatter: Option<FormatFn>,
}

impl ExportDescriptor {
    /// Descriptor with derived header and no explicit order
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let header = start_case(last_segment(&path));
        Self {
            path,
            header,
            order: UNORDERED,
            default: None,
            formatter: None,
        }
    }

    /// Build from field options, falling back to derived values
    pub fn from_options(
        path: impl Into<String>,
        options: &FieldExport,
        fallback_default: Option<FieldDefault>,
    ) -> Self {
        let fallback = FieldExport {
            default: fallback_default,
            ..FieldExport::default()
        };
        Self::new(path).apply(&fallback.merge(options.clone()))
    }

    pub fn with_header(mut self, header: impl Into<String>) -> Self {
        self.header = header.into();
        self
    }

    pub fn with_order(mut self, order: i64) -> Self {
        self.order = order;
        self
    }

    pub fn with_default(mut self, default: FieldDefault) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_formatter(mut self, formatter: FormatFn) -> Self {
        self.formatter = Some(formatter);
        self
    }

    /// Apply the keys present in `options` on top of this descriptor
    pub fn apply(self, options: &FieldExport) -> Self {
        let Self {
            path,
            header,
            order,
            default,
            formatter,
        } = self;
        let current = FieldExport {
            header: Some(header),
            order: Some(order),
            default,
            format: formatter,
        };
        let merged = current.merge(options.clone());

        Self {
            header: merged
                .header
                .unwrap_or_else(|| start_case(last_segment(&path))),
            order: merged.order.unwrap_or(UNORDERED),
            default: merged.default,
            formatter: merged.format,
            path,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn header(&self) -> &str {
        &self.header
    }

    pub fn order(&self) -> i64 {
        self.order
    }

    pub fn is_ordered(&self) -> bool {
        self.order != UNORDERED
    }

    /// Resolved default, invoking computed defaults
    pub fn default_value(&self) -> Option<Bson> {
        self.default.as_ref().map(FieldDefault::resolve)
    }

    /// Format a raw value read from `record`
    ///
    /// An absent value is replaced by the default (`Null` when there is
    /// none) before the formatter runs. A formatter answering `None` keeps the
    /// value unchanged.
    pub fn format(&self, value: Option<&Bson>, record: &Document) -> Result<Formatted> {
        let value = match value {
            Some(v) => v.clone(),
            None => self.default_value().unwrap_or(Bson::Null),
        };

        let Some(formatter) = &self.formatter else {
            return Ok(Formatted::Scalar(value));
        };

        match formatter(&value, record) {
            Ok(Some(formatted)) => Ok(formatted),
            Ok(None) => Ok(Formatted::Scalar(value)),
            Err(source) => Err(ExportableError::format(&self.path, source)),
        }
    }
}

impl fmt::Debug for ExportDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportDescriptor")
            .field("path", &self.path)
            .field("header", &self.header)
            .field("order", &self.order)
            .field("default", &self.default)
            .field("formatter", &self.formatter.as_ref().map(|_| ".."))
            .finish()
    }
}

/// Field path to descriptor mapping, in declaration order
#[derive(Debug, Clone, Default)]
pub struct DescriptorMapping {
    descriptors: Vec<ExportDescriptor>,
}

impl DescriptorMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a descriptor, replacing one with the same path in place
    pub fn insert(&mut self, descriptor: ExportDescriptor) {
        match self
            .descriptors
            .iter_mut()
            .find(|d| d.path == descriptor.path)
        {
            Some(existing) => *existing = descriptor,
            None => self.descriptors.push(descriptor),
        }
    }

    /// Builder-style insert
    pub fn with(mut self, descriptor: ExportDescriptor) -> Self {
        self.insert(descriptor);
        self
    }

    pub fn get(&self, path: &str) -> Option<&ExportDescriptor> {
        self.descriptors.iter().find(|d| d.path == path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.descriptors.iter().map(|d| d.path.as_str()).collect()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ExportDescriptor> {
        self.descriptors.iter()
    }

    /// Descriptors by ascending order, ties kept in declaration order
    pub fn ordered(&self) -> Vec<ExportDescriptor> {
        let mut ordered = self.descriptors.clone();
        ordered.sort_by_key(|d| d.order);
        ordered
    }

    /// Copy with per-path option overrides merged in
    ///
    /// Paths not yet present are added with derived defaults.
    pub fn with_overrides<'a, I>(&self, overrides: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, FieldExport)>,
    {
        let mut mapping = self.clone();
        for (path, options) in overrides {
            let base = mapping
                .get(path)
                .cloned()
                .unwrap_or_else(|| ExportDescriptor::new(path));
            mapping.insert(base.apply(&options));
        }
        mapping
    }

    /// Inclusion projection over the exported paths
    ///
    /// A path is dropped when one of its ancestors is also exported, since
    /// the server rejects overlapping projections.
    pub fn projection(&self) -> Document {
        let mut projection = Document::new();
        for descriptor in &self.descriptors {
            let path = descriptor.path.as_str();
            let covered = self.descriptors.iter().any(|other| {
                path.len() > other.path.len()
                    && path.starts_with(other.path.as_str())
                    && path.as_bytes()[other.path.len()] == b'.'
            });
            if !covered {
                projection.insert(path, 1);
            }
        }
        projection
    }
}

impl FromIterator<ExportDescriptor> for DescriptorMapping {
    fn from_iter<T: IntoIterator<Item = ExportDescriptor>>(iter: T) -> Self {
        let mut mapping = DescriptorMapping::new();
        for descriptor in iter {
            mapping.insert(descriptor);
        }
        mapping
    }
}

impl<'a> IntoIterator for &'a DescriptorMapping {
    type Item = &'a ExportDescriptor;
    type IntoIter = std::slice::Iter<'a, ExportDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.descriptors.iter()
    }
}
