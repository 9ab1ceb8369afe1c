//! CSV cell rendering of BSON values

use bson::{Binary, Bson, DateTime};

use super::converter::BsonConverter;

/// Renders BSON values as plain CSV cell text
///
/// Scalars are written bare, `null` becomes an empty cell, and arrays and
/// sub-documents are written as relaxed extended JSON. Quoting is left to the
/// CSV writer.
#[derive(Debug, Clone, Copy, Default)]
pub struct CellConverter;

impl CellConverter {
    /// Create a new cell converter
    pub fn new() -> Self {
        Self
    }
}

impl BsonConverter for CellConverter {
    type Output = String;

    fn convert(&self, value: &Bson) -> String {
        match value {
            Bson::String(s) => s.clone(),
            Bson::Int32(n) => n.to_string(),
            Bson::Int64(n) => n.to_string(),
            Bson::Double(f) => format_double(*f),
            Bson::Boolean(b) => b.to_string(),
            Bson::Null | Bson::Undefined => String::new(),
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::DateTime(dt) => datetime_to_iso_string(dt),
            Bson::Decimal128(d) => d.to_string(),
            Bson::Array(_) | Bson::Document(_) => {
                serde_json::to_string(&value.clone().into_relaxed_extjson())
                    .unwrap_or_default()
            }
            Bson::Binary(bin) => binary_to_hex(bin),
            Bson::RegularExpression(regex) => format!("/{}/{}", regex.pattern, regex.options),
            Bson::Timestamp(ts) => format!("Timestamp({}, {})", ts.time, ts.increment),
            Bson::MinKey => String::from("MinKey"),
            Bson::MaxKey => String::from("MaxKey"),
            other => format!("{other:?}"),
        }
    }
}

/// Render a double the way spreadsheets read it back
///
/// Integral values lose the trailing `.0`; infinities use their JSON names.
fn format_double(f: f64) -> String {
    if f.is_nan() {
        String::from("NaN")
    } else if f.is_infinite() {
        String::from(if f > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        f.to_string()
    }
}

/// Convert DateTime to ISO 8601 string, falling back to epoch millis
fn datetime_to_iso_string(dt: &DateTime) -> String {
    dt.try_to_rfc3339_string()
        .unwrap_or_else(|_| dt.timestamp_millis().to_string())
}

fn binary_to_hex(bin: &Binary) -> String {
    hex::encode(&bin.bytes)
}
