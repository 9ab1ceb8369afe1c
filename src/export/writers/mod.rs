//! Output encoding and destinations
//!
//! The serializer turns output rows into CSV bytes; the helpers here prepare
//! file destinations for exports that go straight to disk.

use std::path::Path;

use chrono::Local;
use tokio::fs::File;
use tokio::io::BufWriter;

use crate::error::{ConfigError, ExportableError, Result};

pub mod csv;

pub use csv::CsvSerializer;

/// Timestamped default file name for an export
///
/// # Arguments
/// * `prefix` - Leading part of the name, usually the collection name
///
/// # Returns
/// * `String` - e.g. `users_20240115_103000.csv`
pub fn default_filename(prefix: &str) -> String {
    format!("{}_{}.csv", prefix, Local::now().format("%Y%m%d_%H%M%S"))
}

/// Helper function to create a buffered file writer
///
/// # Arguments
/// * `path` - File path to create
///
/// # Returns
/// * `Result<BufWriter<File>>` - Buffered writer or error
pub(crate) async fn create_writer(path: &Path) -> Result<BufWriter<File>> {
    validate_path(path)?;
    let file = File::create(path).await.map_err(ExportableError::Io)?;
    Ok(BufWriter::with_capacity(1024 * 1024, file))
}

/// Check that the parent directory of `path` exists
pub(crate) fn validate_path(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            return Err(ConfigError::InvalidValue {
                field: "output path".to_string(),
                value: format!("directory does not exist: {}", parent.display()),
            }
            .into());
        }
    }

    Ok(())
}
