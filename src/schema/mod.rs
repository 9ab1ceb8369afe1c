//! Field trees and exportable-field compilation
//!
//! A field tree describes the named, possibly nested, typed fields of a
//! record kind. Leaves may carry an [`Exportable`] marker; the compiler walks
//! the tree once and produces an immutable [`DescriptorMapping`].
//!
//! Host document layers plug in through the [`FieldTree`] trait. [`Schema`]
//! is the bundled implementation, built in code or parsed from a
//! mongoose-style BSON definition:
//!
//! ```rust
//! use bson::doc;
//! use mongo_exportable::config::MissingValues;
//! use mongo_exportable::schema::{Schema, compile};
//!
//! let schema = Schema::from_document(&doc! {
//!     "name": { "type": "String", "exportable": true },
//!     "contact": {
//!         "phone": { "type": "String", "exportable": true },
//!         "email": { "type": "String" },
//!     },
//! });
//!
//! let mapping = compile(&schema, &MissingValues::default());
//! assert_eq!(mapping.paths(), vec!["name", "contact.phone"]);
//! ```

pub mod compiler;
pub mod descriptor;
pub mod exportable;
pub mod registry;

pub use compiler::compile;
pub use descriptor::{DescriptorMapping, ExportDescriptor, UNORDERED};
pub use exportable::{
    Exportable, FieldDefault, FieldExport, FormatFn, FormatResult, Formatted, formatter,
};
pub use registry::ExportableRegistry;

use bson::{Bson, Document};

/// Capability to enumerate the leaves of a field tree
pub trait FieldTree {
    /// Visit every leaf path in declaration order
    ///
    /// Nested sub-documents are descended into; arrays (of scalars or of
    /// sub-documents) are reported as single leaves.
    fn each_path(&self, visit: &mut dyn FnMut(&str, &FieldDef));
}

/// Value type of a leaf field
#[derive(Debug, Clone)]
pub enum FieldKind {
    String,
    Number,
    Boolean,
    Date,
    ObjectId,
    Decimal,
    Mixed,
    /// Array of the inner kind.
    Array(Box<FieldKind>),
    /// Sub-document stored inside an array.
    Embedded(Schema),
}

impl FieldKind {
    /// Resolve a type name as written in schema definitions
    ///
    /// Unknown names fall back to [`FieldKind::Mixed`].
    pub fn from_name(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "string" => FieldKind::String,
            "number" => FieldKind::Number,
            "boolean" | "bool" => FieldKind::Boolean,
            "date" => FieldKind::Date,
            "objectid" => FieldKind::ObjectId,
            "decimal" | "decimal128" => FieldKind::Decimal,
            _ => FieldKind::Mixed,
        }
    }
}

/// Leaf field definition
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub kind: FieldKind,
    pub default: Option<FieldDefault>,
    pub exportable: Exportable,
}

impl FieldDef {
    pub fn new(kind: FieldKind) -> Self {
        Self {
            kind,
            default: None,
            exportable: Exportable::Disabled,
        }
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn number() -> Self {
        Self::new(FieldKind::Number)
    }

    pub fn array_of(kind: FieldKind) -> Self {
        Self::new(FieldKind::Array(Box::new(kind)))
    }

    /// Schema-level default value
    pub fn default_value(mut self, value: impl Into<Bson>) -> Self {
        self.default = Some(FieldDefault::Value(value.into()));
        self
    }

    /// Schema-level default produced on demand
    pub fn default_with<F>(mut self, producer: F) -> Self
    where
        F: Fn() -> Bson + Send + Sync + 'static,
    {
        self.default = Some(FieldDefault::computed(producer));
        self
    }

    /// Mark the field exportable (`true`, or a [`FieldExport`])
    pub fn exportable(mut self, exportable: impl Into<Exportable>) -> Self {
        self.exportable = exportable.into();
        self
    }

    pub fn is_number(&self) -> bool {
        matches!(self.kind, FieldKind::Number)
    }

    pub fn is_string(&self) -> bool {
        matches!(self.kind, FieldKind::String)
    }
}

/// Node of a [`Schema`]
#[derive(Debug, Clone)]
pub enum SchemaNode {
    Field(FieldDef),
    Nested(Schema),
}

/// Declarative field tree
#[derive(Debug, Clone, Default)]
pub struct Schema {
    nodes: Vec<(String, SchemaNode)>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a leaf field
    pub fn field(mut self, name: impl Into<String>, def: FieldDef) -> Self {
        self.nodes.push((name.into(), SchemaNode::Field(def)));
        self
    }

    /// Add a nested sub-document
    pub fn nested(mut self, name: impl Into<String>, schema: Schema) -> Self {
        self.nodes.push((name.into(), SchemaNode::Nested(schema)));
        self
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Parse a mongoose-style schema definition
    ///
    /// Recognised shapes per key:
    /// - `"Number"`: leaf of that type
    /// - `["String"]` or `[{ ... }]`: array leaf
    /// - `{ type: ..., default: ..., exportable: ... }`: leaf with options
    /// - any other document: nested sub-document
    pub fn from_document(definition: &Document) -> Self {
        let mut schema = Schema::new();
        for (name, value) in definition {
            schema.nodes.push((name.clone(), parse_node(value)));
        }
        schema
    }

    fn walk(&self, prefix: &str, visit: &mut dyn FnMut(&str, &FieldDef)) {
        for (name, node) in &self.nodes {
            let path = if prefix.is_empty() {
                name.clone()
            } else {
                format!("{prefix}.{name}")
            };

            match node {
                SchemaNode::Field(def) => visit(&path, def),
                SchemaNode::Nested(schema) => schema.walk(&path, visit),
            }
        }
    }
}

impl FieldTree for Schema {
    fn each_path(&self, visit: &mut dyn FnMut(&str, &FieldDef)) {
        self.walk("", visit);
    }
}

fn parse_node(value: &Bson) -> SchemaNode {
    match value {
        Bson::Document(doc) if doc.is_empty() => SchemaNode::Field(FieldDef::new(FieldKind::Mixed)),
        Bson::Document(doc) => match doc.get("type") {
            Some(type_value) => {
                let mut def = FieldDef::new(parse_kind(type_value));
                def.default = doc.get("default").cloned().map(FieldDefault::Value);
                def.exportable = doc
                    .get("exportable")
                    .map(Exportable::from_bson)
                    .unwrap_or_default();
                SchemaNode::Field(def)
            }
            None => SchemaNode::Nested(Schema::from_document(doc)),
        },
        other => SchemaNode::Field(FieldDef::new(parse_kind(other))),
    }
}

fn parse_kind(value: &Bson) -> FieldKind {
    match value {
        Bson::String(name) => FieldKind::from_name(name),
        Bson::Array(items) => {
            let inner = match items.first() {
                None => FieldKind::Mixed,
                Some(Bson::Document(doc)) => match doc.get("type") {
                    Some(type_value) => parse_kind(type_value),
                    None => FieldKind::Embedded(Schema::from_document(doc)),
                },
                Some(other) => parse_kind(other),
            };
            FieldKind::Array(Box::new(inner))
        }
        _ => FieldKind::Mixed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    fn collect_paths(tree: &dyn FieldTree) -> Vec<String> {
        let mut paths = Vec::new();
        tree.each_path(&mut |path, _| paths.push(path.to_string()));
        paths
    }

    #[test]
    fn test_each_path_visits_nested_leaves() {
        let schema = Schema::new()
            .field("name", FieldDef::string())
            .nested(
                "contact",
                Schema::new()
                    .field("phone", FieldDef::string())
                    .nested("address", Schema::new().field("city", FieldDef::string())),
            )
            .field("age", FieldDef::number());

        assert_eq!(
            collect_paths(&schema),
            vec!["name", "contact.phone", "contact.address.city", "age"]
        );
    }

    #[test]
    fn test_from_document_shapes() {
        let schema = Schema::from_document(&doc! {
            "name": { "type": "String", "exportable": true },
            "age": "Number",
            "titles": ["String"],
            "comments": [{ "body": { "type": "String" } }],
            "contact": { "phone": { "type": "String", "default": "n/a" } },
            "extra": {},
        });

        let mut kinds = Vec::new();
        schema.each_path(&mut |path, def| kinds.push((path.to_string(), def.clone())));

        let paths: Vec<&str> = kinds.iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(
            paths,
            vec!["name", "age", "titles", "comments", "contact.phone", "extra"]
        );

        assert!(kinds[0].1.is_string());
        assert!(kinds[0].1.exportable.is_enabled());
        assert!(kinds[1].1.is_number());
        assert!(matches!(kinds[2].1.kind, FieldKind::Array(ref k) if matches!(**k, FieldKind::String)));
        assert!(matches!(kinds[3].1.kind, FieldKind::Array(ref k) if matches!(**k, FieldKind::Embedded(_))));
        assert!(!kinds[2].1.is_string());
        assert!(matches!(
            kinds[4].1.default,
            Some(FieldDefault::Value(Bson::String(ref s))) if s == "n/a"
        ));
        assert!(matches!(kinds[5].1.kind, FieldKind::Mixed));
    }
}
