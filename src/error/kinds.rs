use std::{fmt, io};

use crate::error::mongo::format_mongodb_error;

/// Crate-wide `Result` type using [`ExportableError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportableError>;

/// Boxed error returned by user-supplied field formatters.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Top-level error type for export operations.
///
/// Every failure that can end an export converges here, so the completion
/// callback and the returned stream only ever deal with a single type.
#[derive(Debug)]
pub enum ExportableError {
    /// Query, aggregation or cursor failures.
    Source(SourceError),

    /// A field formatter rejected a value.
    Format { path: String, source: BoxError },

    /// CSV encoding failed.
    Serialize(String),

    /// The destination refused a write.
    Sink(io::Error),

    /// Configuration errors.
    Config(ConfigError),

    /// I/O errors outside the sink (config files, output paths).
    Io(io::Error),

    /// MongoDB driver errors.
    MongoDb(mongodb::error::Error),

    /// The export stream was dropped before it finished.
    Aborted,

    /// Generic error with a free-form message.
    Generic(String),
}

/// Record source errors.
#[derive(Debug)]
pub enum SourceError {
    /// Query or aggregation execution failed.
    QueryFailed(String),

    /// Reading the next record from the cursor failed.
    CursorError(String),

    /// Aggregation stage the store cannot run.
    UnsupportedStage(String),

    /// Filter operator the store cannot evaluate.
    UnsupportedOperator(String),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportableError::Source(e) => write!(f, "Source error: {e}"),
            ExportableError::Format { path, source } => {
                write!(f, "Failed to format field '{path}': {source}")
            }
            ExportableError::Serialize(msg) => write!(f, "CSV serialization failed: {msg}"),
            ExportableError::Sink(e) => write!(f, "Failed to write export output: {e}"),
            ExportableError::Config(e) => write!(f, "Configuration error: {e}"),
            ExportableError::Io(e) => write!(f, "I/O error: {e}"),
            ExportableError::MongoDb(e) => format_mongodb_error(f, e),
            ExportableError::Aborted => write!(f, "Export stream dropped before completion"),
            ExportableError::Generic(msg) => write!(f, "{msg}"),
        }
    }
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::QueryFailed(msg) => write!(f, "Query failed: {msg}"),
            SourceError::CursorError(msg) => write!(f, "Cursor error: {msg}"),
            SourceError::UnsupportedStage(stage) => {
                write!(f, "Unsupported aggregation stage: {stage}")
            }
            SourceError::UnsupportedOperator(op) => write!(f, "Unsupported filter operator: {op}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportableError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportableError::Format { source, .. } => Some(source.as_ref()),
            ExportableError::Sink(e) | ExportableError::Io(e) => Some(e),
            ExportableError::MongoDb(e) => Some(e),
            _ => None,
        }
    }
}
impl std::error::Error for SourceError {}
impl std::error::Error for ConfigError {}

impl ExportableError {
    /// Wrap a formatter failure with the path it happened on.
    pub fn format(path: impl Into<String>, source: BoxError) -> Self {
        ExportableError::Format {
            path: path.into(),
            source,
        }
    }

    /// Whether the error came from the destination rather than the pipeline.
    pub fn is_sink_error(&self) -> bool {
        matches!(self, ExportableError::Sink(_))
    }
}

/* ========================= Conversions to ExportableError ========================= */

impl From<io::Error> for ExportableError {
    fn from(err: io::Error) -> Self {
        ExportableError::Io(err)
    }
}

impl From<mongodb::error::Error> for ExportableError {
    fn from(err: mongodb::error::Error) -> Self {
        ExportableError::MongoDb(err)
    }
}

impl From<csv::Error> for ExportableError {
    fn from(err: csv::Error) -> Self {
        ExportableError::Serialize(err.to_string())
    }
}

impl From<SourceError> for ExportableError {
    fn from(err: SourceError) -> Self {
        ExportableError::Source(err)
    }
}

impl From<ConfigError> for ExportableError {
    fn from(err: ConfigError) -> Self {
        ExportableError::Config(err)
    }
}

impl From<String> for ExportableError {
    fn from(msg: String) -> Self {
        ExportableError::Generic(msg)
    }
}

impl From<&str> for ExportableError {
    fn from(msg: &str) -> Self {
        ExportableError::Generic(msg.to_owned())
    }
}
