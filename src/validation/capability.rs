//! Capability payload schemas
//!
//! Maps each capability name to the schema its `request_payload` must satisfy.
//! Capability names are unique, so an envelope tag selects at most one contract.

use crate::validation::schema::{CompiledSchema, SchemaError};
use schemars::JsonSchema;
use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

/// Registry population failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RegistryError {
    #[error("Capability '{0}' is already registered")]
    Duplicate(String),
    #[error("Capability name cannot be empty")]
    EmptyName,
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

/// Capability name to payload schema
#[derive(Debug, Default, Clone)]
pub struct CapabilityRegistry {
    schemas: HashMap<String, CompiledSchema>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a raw JSON Schema for `capability`
    pub fn register(&mut self, capability: &str, schema: Value) -> Result<(), RegistryError> {
        let compiled = CompiledSchema::compile(capability, schema)?;
        self.insert(capability, compiled)
    }

    /// Register the derived schema of `P` for `capability`
    pub fn register_type<P: JsonSchema>(&mut self, capability: &str) -> Result<(), RegistryError> {
        let compiled = CompiledSchema::for_type::<P>()?;
        self.insert(capability, compiled)
    }

    fn insert(&mut self, capability: &str, schema: CompiledSchema) -> Result<(), RegistryError> {
        if capability.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if self.schemas.contains_key(capability) {
            return Err(RegistryError::Duplicate(capability.to_string()));
        }
        debug!(capability, schema = schema.name(), "Registered capability schema");
        self.schemas.insert(capability.to_string(), schema);
        Ok(())
    }

    pub fn get(&self, capability: &str) -> Option<&CompiledSchema> {
        self.schemas.get(capability)
    }

    pub fn contains(&self, capability: &str) -> bool {
        self.schemas.contains_key(capability)
    }

    /// Registered capability names, sorted
    pub fn capabilities(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register("search", json!({"type": "object", "required": ["terms"]}))
            .unwrap();

        assert!(registry.contains("search"));
        assert!(registry.get("search").is_some());
        assert!(registry.get("summarize").is_none());
        assert_eq!(registry.capabilities(), vec!["search".to_string()]);
    }

    #[test]
    fn test_duplicate_capability_rejected() {
        let mut registry = CapabilityRegistry::new();
        registry.register("search", json!({"type": "object"})).unwrap();
        let err = registry
            .register("search", json!({"type": "string"}))
            .unwrap_err();
        assert_eq!(err, RegistryError::Duplicate("search".to_string()));
    }

    #[test]
    fn test_empty_name_rejected() {
        let mut registry = CapabilityRegistry::new();
        let err = registry.register("", json!({"type": "object"})).unwrap_err();
        assert_eq!(err, RegistryError::EmptyName);
    }
}
