//! Exportable-field compilation
//!
//! Walks a field tree once and turns every leaf marked exportable into an
//! [`ExportDescriptor`]. Compilation is total: malformed markers were already
//! mapped to [`Exportable::Disabled`] when the tree was built, so nothing here
//! can fail.

use bson::Bson;
use tracing::debug;

use crate::config::MissingValues;

use super::descriptor::{DescriptorMapping, ExportDescriptor};
use super::exportable::{Exportable, FieldDefault};
use super::{FieldDef, FieldTree};

/// Compile the exportable fields of a tree
///
/// # Arguments
/// * `tree` - Field tree to walk
/// * `missing` - Fallbacks for numeric and string fields without a default
///
/// # Returns
/// * `DescriptorMapping` - Exactly the exportable leaves, in declaration order
pub fn compile(tree: &dyn FieldTree, missing: &MissingValues) -> DescriptorMapping {
    let mut mapping = DescriptorMapping::new();

    tree.each_path(&mut |path, field| {
        if let Exportable::Enabled(options) = &field.exportable {
            let fallback = fallback_default(field, missing);
            mapping.insert(ExportDescriptor::from_options(path, options, fallback));
        }
    });

    debug!(
        "Compiled {} exportable fields: {:?}",
        mapping.len(),
        mapping.paths()
    );

    mapping
}

/// Default used when the export options give none
///
/// Schema default first, then the type-based missing value.
fn fallback_default(field: &FieldDef, missing: &MissingValues) -> Option<FieldDefault> {
    if let Some(default) = &field.default {
        return Some(default.clone());
    }

    if field.is_number() {
        return Some(FieldDefault::Value(number_value(missing.number)));
    }

    if field.is_string() {
        return Some(FieldDefault::Value(Bson::String(missing.string.clone())));
    }

    None
}

/// Narrowest BSON number representing `n`
fn number_value(n: f64) -> Bson {
    if n.fract() == 0.0 && n >= f64::from(i32::MIN) && n <= f64::from(i32::MAX) {
        Bson::Int32(n as i32)
    } else if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
        Bson::Int64(n as i64)
    } else {
        Bson::Double(n)
    }
}
