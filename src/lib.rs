//! Schema-driven streaming CSV export for MongoDB collections
//!
//! Fields are marked exportable on a schema; the marked fields compile into a
//! descriptor mapping that drives a pull-based export of query, aggregation or
//! arbitrary record streams to CSV.
//!
//! # Modules
//!
//! - `config`: Configuration management
//! - `error`: Error types and handling
//! - `export`: Record sources, the CSV pipeline and model export surfaces
//! - `formatter`: BSON value to cell text conversion
//! - `schema`: Field trees and exportable-field compilation
//! - `utils`: Utility functions and helpers
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use bson::{Document, doc};
//! use mongo_exportable::export::{ExportOptions, ExportableModel};
//! use mongo_exportable::schema::{ExportableRegistry, Schema};
//! use mongo_exportable::Config;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::load(None)?;
//!     mongo_exportable::utils::logging::init(&config.logging);
//!
//!     let client = mongodb::Client::with_uri_str("mongodb://localhost:27017").await?;
//!     let users = client.database("app").collection::<Document>("users");
//!
//!     let schema = Schema::from_document(&doc! {
//!         "name": { "type": "String", "exportable": true },
//!         "age": { "type": "Number", "exportable": { "header": "Years" } },
//!     });
//!
//!     let registry = ExportableRegistry::new(config.missing.clone());
//!     let model = ExportableModel::attach(&registry, Arc::new(users), &schema, config.export);
//!
//!     let summary = model
//!         .export_csv_to_file(ExportOptions::new(), "users.csv")
//!         .await?;
//!     println!("Exported {} records", summary.records);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod export;
pub mod formatter;
pub mod schema;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use error::{ExportableError, Result};
pub use export::{CsvStream, ExportOptions, ExportSummary, ExportableModel};
pub use schema::{DescriptorMapping, ExportableRegistry, Schema, compile};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
///
/// # Returns
/// * `&str` - Version string
pub fn version() -> &'static str {
    VERSION
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}
