//! Compiled JSON Schemas
//!
//! Wraps a `jsonschema` validator together with the schema document it was built from.
//! Schemas for protocol types are derived with `schemars`.

use crate::validation::messages::describe;
use crate::validation::FieldErrors;
use jsonschema::Validator;
use schemars::JsonSchema;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

/// Schema compilation failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum SchemaError {
    #[error("Schema '{name}' failed to compile: {message}")]
    Compile { name: String, message: String },
    #[error("Schema '{name}' could not be serialized: {message}")]
    Serialize { name: String, message: String },
}

/// Schema violations keyed by dotted field path, plus the engine's own messages
#[derive(Debug, Default, Clone)]
pub struct SchemaViolations {
    pub field_errors: FieldErrors,
    pub raw: Vec<String>,
}

impl SchemaViolations {
    pub fn is_empty(&self) -> bool {
        self.field_errors.is_empty()
    }
}

/// A named, compiled schema that can be shared across threads
#[derive(Clone)]
pub struct CompiledSchema {
    name: String,
    document: Arc<Value>,
    validator: Arc<Validator>,
}

impl CompiledSchema {
    /// Compile an arbitrary JSON Schema document
    pub fn compile(name: impl Into<String>, document: Value) -> Result<Self, SchemaError> {
        let name = name.into();
        let validator = jsonschema::validator_for(&document).map_err(|e| SchemaError::Compile {
            name: name.clone(),
            message: e.to_string(),
        })?;

        Ok(Self {
            name,
            document: Arc::new(document),
            validator: Arc::new(validator),
        })
    }

    /// Derive and compile the schema of `T`
    pub fn for_type<T: JsonSchema>() -> Result<Self, SchemaError> {
        let name = T::schema_name();
        let document =
            serde_json::to_value(schemars::schema_for!(T)).map_err(|e| SchemaError::Serialize {
                name: name.clone(),
                message: e.to_string(),
            })?;
        Self::compile(name, document)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validator.is_valid(instance)
    }

    /// Every violation of this schema, collected in one pass
    pub fn collect_errors(&self, instance: &Value) -> SchemaViolations {
        let mut violations = SchemaViolations::default();
        if let Err(errors) = self.validator.validate(instance) {
            for error in errors {
                violations
                    .raw
                    .push(format!("At '{}': {}", error.instance_path, error));
                let (path, message) = describe(&error);
                let messages = violations.field_errors.entry(path).or_default();
                if !messages.contains(&message) {
                    messages.push(message);
                }
            }
        }
        violations
    }
}

impl fmt::Debug for CompiledSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledSchema")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
