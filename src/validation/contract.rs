//! Semantic checks that JSON Schema cannot express
//!
//! Structural rules (types, lengths, required fields) live in each type's derived
//! schema. Rules that depend on the clock or on fixed literals are expressed through
//! [`Contract::check`], which reports into a [`Scope`] rooted at the value's path.

use crate::protocol::identifier::Identifier;
use crate::validation::FieldErrors;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

/// Path key used for errors that apply to the whole value
pub const ROOT_PATH: &str = "(root)";

/// A type the validation pipeline can enforce
pub trait Contract: JsonSchema + DeserializeOwned {
    /// Report semantic violations; the default accepts everything
    fn check(&self, _scope: &mut Scope<'_>) {}
}

impl Contract for serde_json::Value {}

/// Error collector positioned at a field path
pub struct Scope<'a> {
    path: String,
    now_ms: u64,
    errors: &'a mut FieldErrors,
}

impl<'a> Scope<'a> {
    pub(crate) fn root(now_ms: u64, errors: &'a mut FieldErrors) -> Self {
        Self {
            path: String::new(),
            now_ms,
            errors,
        }
    }

    /// Validation time all identifier timestamps are compared against
    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Record a message against `field` relative to this scope
    pub fn report(&mut self, field: &str, message: impl Into<String>) {
        let key = join_path(&self.path, field);
        self.errors.entry(key).or_default().push(message.into());
    }

    pub fn identifier(&mut self, field: &str, id: &Identifier) {
        if let Err(e) = id.verify(self.now_ms) {
            self.report(field, format!("Invalid identifier: {e}"));
        }
    }

    /// Require `actual` to equal a fixed literal
    pub fn fixed(&mut self, field: &str, actual: &str, expected: &str) {
        if actual != expected {
            self.report(
                field,
                format!("Invalid literal value, expected \"{expected}\", received \"{actual}\""),
            );
        }
    }

    /// Run a nested value's checks with paths prefixed by `field`
    pub fn nested<C: Contract>(&mut self, field: &str, value: &C) {
        let mut child = Scope {
            path: join_path(&self.path, field),
            now_ms: self.now_ms,
            errors: &mut *self.errors,
        };
        value.check(&mut child);
    }
}

/// Join two dotted path segments, treating empty as the root
pub fn join_path(prefix: &str, field: &str) -> String {
    match (prefix.is_empty(), field.is_empty()) {
        (true, true) => ROOT_PATH.to_string(),
        (true, false) => field.to_string(),
        (false, true) => prefix.to_string(),
        (false, false) => format!("{prefix}.{field}"),
    }
}
