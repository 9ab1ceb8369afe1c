//! Per-field `exportable` markers and formatter types

use std::fmt;
use std::sync::Arc;

use bson::{Bson, Document};

use crate::error::BoxError;

/// Outcome of a user formatter.
///
/// `Ok(None)` leaves the value unchanged; every `Some` output is used as-is,
/// including `0`, `false` and empty strings.
pub type FormatResult = std::result::Result<Option<Formatted>, BoxError>;

/// User formatter receiving the (defaulted) value and the full source record.
pub type FormatFn = Arc<dyn Fn(&Bson, &Document) -> FormatResult + Send + Sync>;

/// Wrap a closure as a [`FormatFn`]
pub fn formatter<F>(f: F) -> FormatFn
where
    F: Fn(&Bson, &Document) -> FormatResult + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Formatted cell content for one descriptor
#[derive(Debug, Clone, PartialEq)]
pub enum Formatted {
    /// Single value placed under the descriptor's header.
    Scalar(Bson),

    /// Several named values, each becoming its own column.
    Columns(Document),
}

impl Formatted {
    /// Wrap anything convertible to BSON as a single cell
    pub fn scalar(value: impl Into<Bson>) -> Self {
        Formatted::Scalar(value.into())
    }

    /// Fan a value out into several columns
    pub fn columns(columns: Document) -> Self {
        Formatted::Columns(columns)
    }
}

/// Default value of a field, either fixed or produced on demand
#[derive(Clone)]
pub enum FieldDefault {
    /// Fixed value.
    Value(Bson),

    /// Zero-argument producer invoked each time the default is needed.
    Computed(Arc<dyn Fn() -> Bson + Send + Sync>),
}

impl FieldDefault {
    /// Fixed default
    pub fn value(value: impl Into<Bson>) -> Self {
        FieldDefault::Value(value.into())
    }

    /// Default computed at export time (e.g. "now")
    pub fn computed<F>(producer: F) -> Self
    where
        F: Fn() -> Bson + Send + Sync + 'static,
    {
        FieldDefault::Computed(Arc::new(producer))
    }

    /// Obtain the concrete value
    pub fn resolve(&self) -> Bson {
        match self {
            FieldDefault::Value(value) => value.clone(),
            FieldDefault::Computed(producer) => producer(),
        }
    }
}

impl fmt::Debug for FieldDefault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldDefault::Value(value) => f.debug_tuple("Value").field(value).finish(),
            FieldDefault::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

impl From<Bson> for FieldDefault {
    fn from(value: Bson) -> Self {
        FieldDefault::Value(value)
    }
}

/// Export options of a single field.
///
/// Every key is optional; absent keys fall back to the derived defaults.
#[derive(Clone, Default)]
pub struct FieldExport {
    pub header: Option<String>,
    pub order: Option<i64>,
    pub default: Option<FieldDefault>,
    pub format: Option<FormatFn>,
}

impl FieldExport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Column header
    pub fn header(mut self, header: impl Into<String>) -> Self {
        self.header = Some(header.into());
        self
    }

    /// Column sort key; lower values come first
    pub fn order(mut self, order: i64) -> Self {
        self.order = Some(order);
        self
    }

    /// Export-specific default, taking precedence over the schema default
    pub fn default_value(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Export-specific computed default
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Bson + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::computed(producer));
        self
    }

    /// Value formatter
    pub fn format<F>(mut self, formatter: F) -> Self
    where
        F: Fn(&Bson, &Document) -> FormatResult + Send + Sync + 'static,
    {
        self.format = Some(Arc::new(formatter));
        self
    }

    /// Right-biased shallow merge: keys present in `other` win
    pub fn merge(self, other: FieldExport) -> FieldExport {
        FieldExport {
            header: other.header.or(self.header),
            order: other.order.or(self.order),
            default: other.default.or(self.default),
            format: other.format.or(self.format),
        }
    }

    /// Parse options from a BSON document
    ///
    /// Recognises `header` (string), `order` (integer or integral double) and
    /// `default` (any value). Wrong-typed keys are ignored.
    pub fn from_document(doc: &Document) -> Self {
        let header = match doc.get("header") {
            Some(Bson::String(h)) => Some(h.clone()),
            _ => None,
        };

        let order = match doc.get("order") {
            Some(Bson::Int32(n)) => Some(i64::from(*n)),
            Some(Bson::Int64(n)) => Some(*n),
            Some(Bson::Double(f)) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        };

        let default = doc.get("default").cloned().map(FieldDefault::Value);

        Self {
            header,
            order,
            default,
            format: None,
        }
    }
}

impl fmt::Debug for FieldExport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldExport")
            .field("header", &self.header)
            .field("order", &self.order)
            .field("default", &self.default)
            .field("format", &self.format.as_ref().map(|_| ".."))
            .finish()
    }
}

/// `exportable` marker carried by a schema field
#[derive(Debug, Clone, Default)]
pub enum Exportable {
    /// Not exported.
    #[default]
    Disabled,

    /// Exported with the given options (all defaults for `true`).
    Enabled(FieldExport),
}

impl Exportable {
    /// Equivalent of `exportable: true`
    pub fn enabled() -> Self {
        Exportable::Enabled(FieldExport::default())
    }

    /// Exported with options
    pub fn with(options: FieldExport) -> Self {
        Exportable::Enabled(options)
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Exportable::Enabled(_))
    }

    /// Interpret a marker found in a BSON schema definition
    ///
    /// `true` and documents enable export; everything else, including
    /// malformed values, disables it.
    pub fn from_bson(value: &Bson) -> Self {
        match value {
            Bson::Boolean(true) => Exportable::enabled(),
            Bson::Document(doc) => Exportable::Enabled(FieldExport::from_document(doc)),
            _ => Exportable::Disabled,
        }
    }
}

impl From<bool> for Exportable {
    fn from(enabled: bool) -> Self {
        if enabled {
            Exportable::enabled()
        } else {
            Exportable::Disabled
        }
    }
}

impl From<FieldExport> for Exportable {
    fn from(options: FieldExport) -> Self {
        Exportable::Enabled(options)
    }
}
