//! Core converter trait for BSON value conversion

use bson::Bson;

/// Core trait for BSON value conversion
///
/// Different strategies render values for different outputs; the export
/// pipeline uses [`super::CellConverter`] for CSV cells.
pub trait BsonConverter {
    /// Output type of the conversion
    type Output;

    /// Convert a BSON value to the output type
    fn convert(&self, value: &Bson) -> Self::Output;

    /// Convert an optional BSON value
    ///
    /// # Returns
    /// Converted value or default for None
    fn convert_optional(&self, value: Option<&Bson>) -> Self::Output
    where
        Self::Output: Default,
    {
        value.map(|v| self.convert(v)).unwrap_or_default()
    }
}
