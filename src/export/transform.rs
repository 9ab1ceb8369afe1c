//! Record to output-row transformation

use bson::{Bson, Document};

use crate::config::EscapeMode;
use crate::error::Result;
use crate::schema::{DescriptorMapping, ExportDescriptor, Formatted};
use crate::utils::path::get_path;

/// Turns source records into flat output rows keyed by header
#[derive(Debug, Clone)]
pub struct RecordTransformer {
    descriptors: Vec<ExportDescriptor>,
    escape: EscapeMode,
}

impl RecordTransformer {
    /// Create a transformer over the mapping's descriptors in column order
    pub fn new(mapping: &DescriptorMapping, escape: EscapeMode) -> Self {
        Self {
            descriptors: mapping.ordered(),
            escape,
        }
    }

    /// Transform one record
    ///
    /// Descriptors run in ascending order. Scalar results land under the
    /// descriptor's header, fan-out columns are merged in, and later writes
    /// to the same key win.
    ///
    /// # Arguments
    /// * `record` - Projected source record
    ///
    /// # Returns
    /// * `Result<Document>` - Output row, or the first formatter error
    pub fn transform(&self, record: &Document) -> Result<Document> {
        let mut row = Document::new();

        for descriptor in &self.descriptors {
            let value = get_path(record, descriptor.path());
            match descriptor.format(value, record)? {
                Formatted::Scalar(value) => {
                    row.insert(descriptor.header(), value);
                }
                Formatted::Columns(columns) => {
                    for (column, value) in columns {
                        row.insert(column, value);
                    }
                }
            }
        }

        if self.escape == EscapeMode::Semicolon {
            escape_commas(&mut row);
        }

        Ok(row)
    }
}

/// Replace every `,` in string cells with `;`
fn escape_commas(row: &mut Document) {
    for (_, value) in row.iter_mut() {
        if let Bson::String(text) = value {
            if text.contains(',') {
                *text = text.replace(',', ";");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{FieldDefault, formatter};
    use bson::doc;

    fn mapping() -> DescriptorMapping {
        DescriptorMapping::new()
            .with(ExportDescriptor::new("name"))
            .with(ExportDescriptor::new("age").with_default(FieldDefault::value(0)))
            .with(ExportDescriptor::new("contact.phone").with_order(1))
    }

    #[test]
    fn test_columns_follow_order_then_declaration() {
        let transformer = RecordTransformer::new(&mapping(), EscapeMode::Semicolon);
        let row = transformer
            .transform(&doc! { "name": "Amy", "age": 30, "contact": { "phone": "555" } })
            .unwrap();

        let keys: Vec<&str> = row.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Phone", "Name", "Age"]);
        assert_eq!(row, doc! { "Phone": "555", "Name": "Amy", "Age": 30 });
    }

    #[test]
    fn test_absent_values_take_defaults() {
        let transformer = RecordTransformer::new(&mapping(), EscapeMode::Semicolon);
        let row = transformer.transform(&doc! { "name": "Bo" }).unwrap();

        assert_eq!(row.get("Age"), Some(&Bson::Int32(0)));
        assert_eq!(row.get("Phone"), Some(&Bson::Null));
    }

    #[test]
    fn test_fan_out_columns_are_merged() {
        let split = formatter(|value, _| {
            let full = value.as_str().unwrap_or_default();
            let (first, last) = full.split_once(' ').unwrap_or((full, ""));
            Ok(Some(Formatted::columns(doc! { "First": first, "Last": last })))
        });
        let mapping = DescriptorMapping::new()
            .with(ExportDescriptor::new("name").with_formatter(split))
            .with(ExportDescriptor::new("age"));

        let row = RecordTransformer::new(&mapping, EscapeMode::Semicolon)
            .transform(&doc! { "name": "Amy Pond", "age": 30 })
            .unwrap();

        assert_eq!(row, doc! { "First": "Amy", "Last": "Pond", "Age": 30 });
    }

    #[test]
    fn test_later_writes_win() {
        let mapping = DescriptorMapping::new()
            .with(ExportDescriptor::new("a").with_header("Value"))
            .with(ExportDescriptor::new("b").with_header("Value"));

        let row = RecordTransformer::new(&mapping, EscapeMode::Semicolon)
            .transform(&doc! { "a": 1, "b": 2 })
            .unwrap();

        assert_eq!(row, doc! { "Value": 2 });
    }

    #[test]
    fn test_comma_escaping() {
        let mapping = DescriptorMapping::new().with(ExportDescriptor::new("name"));
        let record = doc! { "name": "Doe, John" };

        let escaped = RecordTransformer::new(&mapping, EscapeMode::Semicolon)
            .transform(&record)
            .unwrap();
        assert_eq!(escaped.get_str("Name").unwrap(), "Doe; John");

        let quoted = RecordTransformer::new(&mapping, EscapeMode::Quote)
            .transform(&record)
            .unwrap();
        assert_eq!(quoted.get_str("Name").unwrap(), "Doe, John");
    }

    #[test]
    fn test_formatter_error_stops_transform() {
        let failing = formatter(|_, _| Err("bad value".into()));
        let mapping = DescriptorMapping::new().with(ExportDescriptor::new("age").with_formatter(failing));

        let err = RecordTransformer::new(&mapping, EscapeMode::Semicolon)
            .transform(&doc! { "age": 3 })
            .unwrap_err();
        assert!(err.to_string().contains("age"));
    }
}
