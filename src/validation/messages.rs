//! Human-readable rendering of JSON Schema violations
//!
//! Turns `jsonschema` errors into a dotted field path plus a message in the protocol's
//! diagnostic style: type mismatches name both sides, length bounds name their unit.

use crate::validation::contract::{join_path, ROOT_PATH};
use jsonschema::error::{TypeKind, ValidationErrorKind};
use jsonschema::ValidationError;
use serde_json::Value;

/// Field path and message for one schema violation
pub fn describe(error: &ValidationError<'_>) -> (String, String) {
    let base = pointer_to_path(&error.instance_path.to_string());

    match &error.kind {
        ValidationErrorKind::Required { property } => {
            let field = property
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| property.to_string());
            (join_path(&base, &field), "Required".to_string())
        }
        ValidationErrorKind::Type { kind } => {
            let expected = match kind {
                TypeKind::Single(expected) => expected.to_string(),
                TypeKind::Multiple(types) => (*types)
                    .into_iter()
                    .map(|t| t.to_string())
                    .collect::<Vec<_>>()
                    .join(" | "),
            };
            (
                join_path(&base, ""),
                format!("Expected {expected}, received {}", json_type_name(&error.instance)),
            )
        }
        ValidationErrorKind::MinLength { limit } => (
            join_path(&base, ""),
            format!("String must contain at least {limit} character(s)"),
        ),
        ValidationErrorKind::MaxLength { limit } => (
            join_path(&base, ""),
            format!("String must contain at most {limit} character(s)"),
        ),
        ValidationErrorKind::MinItems { limit } => (
            join_path(&base, ""),
            format!("Array must contain at least {limit} item(s)"),
        ),
        ValidationErrorKind::MaxItems { limit } => (
            join_path(&base, ""),
            format!("Array must contain at most {limit} item(s)"),
        ),
        ValidationErrorKind::Minimum { limit } => (
            join_path(&base, ""),
            format!("Number must be greater than or equal to {limit}"),
        ),
        ValidationErrorKind::Maximum { limit } => (
            join_path(&base, ""),
            format!("Number must be less than or equal to {limit}"),
        ),
        ValidationErrorKind::Enum { options } => (
            join_path(&base, ""),
            format!(
                "Invalid enum value. Expected {}, received {}",
                render_options(options),
                error.instance
            ),
        ),
        _ => (join_path(&base, ""), error.to_string()),
    }
}

/// Convert a JSON pointer (`/a/0/b`) into a dotted path (`a.0.b`)
pub fn pointer_to_path(pointer: &str) -> String {
    pointer
        .split('/')
        .filter(|segment| !segment.is_empty())
        .map(|segment| segment.replace("~1", "/").replace("~0", "~"))
        .collect::<Vec<_>>()
        .join(".")
}

/// JSON type name of a value as it appears in diagnostics
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_i64() || n.is_u64() => "integer",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn render_options(options: &Value) -> String {
    match options {
        Value::Array(values) => values
            .iter()
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" | "),
        other => other.to_string(),
    }
}

/// Prefix every key of `errors` with `prefix`
pub(crate) fn prefix_paths(
    errors: crate::validation::FieldErrors,
    prefix: &str,
) -> crate::validation::FieldErrors {
    errors
        .into_iter()
        .map(|(path, messages)| {
            let key = if path == ROOT_PATH {
                prefix.to_string()
            } else {
                join_path(prefix, &path)
            };
            (key, messages)
        })
        .collect()
}
