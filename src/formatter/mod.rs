//! BSON value conversion for CSV output
//!
//! The pipeline formats field values into BSON first (so formatters can keep
//! numbers numeric and fan out into sub-documents) and only turns them into
//! text at the serializer, through a [`BsonConverter`] strategy.

mod cell;
mod converter;

pub use cell::CellConverter;
pub use converter::BsonConverter;
