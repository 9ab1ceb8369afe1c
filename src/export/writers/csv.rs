//! CSV serialization of output rows
//!
//! The header row is taken from the keys of the first non-empty row; later
//! rows are aligned to it, missing columns become empty cells and unknown
//! keys are dropped.

use bson::Document;
use csv::{Terminator, Writer, WriterBuilder};
use tracing::debug;

use crate::error::{ExportableError, Result};
use crate::formatter::{BsonConverter, CellConverter};

/// Incremental CSV encoder
pub struct CsvSerializer {
    writer: Writer<Vec<u8>>,
    delimiter: u8,
    /// Column headers, fixed by the first row
    headers: Option<Vec<String>>,
    /// Converter for BSON to cell text
    converter: CellConverter,
}

impl CsvSerializer {
    /// Create a serializer using `delimiter` between fields
    pub fn new(delimiter: u8) -> Self {
        Self {
            writer: Self::build_writer(delimiter),
            delimiter,
            headers: None,
            converter: CellConverter::new(),
        }
    }

    fn build_writer(delimiter: u8) -> Writer<Vec<u8>> {
        WriterBuilder::new()
            .delimiter(delimiter)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new())
    }

    pub fn headers(&self) -> Option<&[String]> {
        self.headers.as_deref()
    }

    /// Encode one row
    ///
    /// The first non-empty row also emits the header line. Rows without keys
    /// produce no output.
    ///
    /// # Returns
    /// * `Result<Vec<u8>>` - Encoded bytes (possibly empty)
    pub fn serialize(&mut self, row: &Document) -> Result<Vec<u8>> {
        if row.is_empty() {
            return Ok(Vec::new());
        }

        if self.headers.is_none() {
            let headers: Vec<String> = row.keys().cloned().collect();
            debug!("CSV headers: {:?}", headers);
            self.writer.write_record(&headers)?;
            self.headers = Some(headers);
        }

        let cells: Vec<String> = self
            .headers
            .iter()
            .flatten()
            .map(|header| self.converter.convert_optional(row.get(header)))
            .collect();
        self.writer.write_record(&cells)?;

        self.take_output()
    }

    /// Hand out the buffered bytes and start a fresh buffer
    fn take_output(&mut self) -> Result<Vec<u8>> {
        let writer = std::mem::replace(&mut self.writer, Self::build_writer(self.delimiter));
        writer
            .into_inner()
            .map_err(|e| ExportableError::Serialize(e.to_string()))
    }
}
