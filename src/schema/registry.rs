//! Compile-or-fetch cache of descriptor mappings
//!
//! Attaching the exporter to a schema compiles its mapping once; later
//! attaches under the same name return the cached mapping untouched.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::config::MissingValues;

use super::FieldTree;
use super::compiler::compile;
use super::descriptor::DescriptorMapping;

/// Descriptor mappings keyed by schema name
#[derive(Debug, Default)]
pub struct ExportableRegistry {
    missing: MissingValues,
    mappings: RwLock<HashMap<String, Arc<DescriptorMapping>>>,
}

impl ExportableRegistry {
    /// Create a registry compiling with the given missing values
    pub fn new(missing: MissingValues) -> Self {
        Self {
            missing,
            mappings: RwLock::new(HashMap::new()),
        }
    }

    /// Compile the schema's mapping, or return the one already attached
    ///
    /// # Arguments
    /// * `name` - Schema identity (usually the collection or model name)
    /// * `tree` - Field tree to compile on first attach
    pub fn attach(&self, name: &str, tree: &dyn FieldTree) -> Arc<DescriptorMapping> {
        if let Some(existing) = self.get(name) {
            debug!("Exportable fields for '{}' already compiled", name);
            return existing;
        }

        let mut mappings = self.mappings.write().unwrap_or_else(|e| e.into_inner());
        mappings
            .entry(name.to_string())
            .or_insert_with(|| {
                debug!("Compiling exportable fields for '{}'", name);
                Arc::new(compile(tree, &self.missing))
            })
            .clone()
    }

    /// Mapping attached under `name`
    pub fn get(&self, name: &str) -> Option<Arc<DescriptorMapping>> {
        let mappings = self.mappings.read().unwrap_or_else(|e| e.into_inner());
        mappings.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.mappings.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
