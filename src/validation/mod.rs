//! Contract enforcement for everything that crosses the wire
//!
//! [`ValidationContext`] is constructed once and shared. It caches compiled schemas,
//! holds the capability registry, and records per-label timing counters.
//!
//! Every call runs three stages and fails on the first stage that reports anything:
//! structural JSON Schema validation (all violations collected), typed deserialization
//! with defaults, then the [`Contract`] semantic checks.

pub mod capability;
pub mod contract;
pub mod messages;
pub mod schema;

use crate::observability::metrics::{SchemaTimingSnapshot, ValidationMetrics};
use crate::protocol::events::{
    ContentType, DocumentEvent, DoneEvent, ErrorEvent, ResponseEvent, TextBlockEvent,
    TextChunkEvent,
};
use crate::protocol::identifier::current_millis;
use crate::protocol::request::CapabilityEnvelope;
use capability::CapabilityRegistry;
use contract::{Contract, Scope, ROOT_PATH};
use messages::{json_type_name, prefix_paths};
use schema::{CompiledSchema, SchemaError};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, error, warn};

pub use capability::RegistryError;
pub use contract::join_path;

/// Field path to every message reported against it
pub type FieldErrors = BTreeMap<String, Vec<String>>;

/// Outcome of every validation call
pub type ValidationResult<T> = Result<T, ValidationFailure>;

/// Diagnostic label used for response event dispatch
pub const RESPONSE_EVENT_LABEL: &str = "ResponseEvent";

/// A payload that did not satisfy its contract
#[derive(Debug, Clone, Error, PartialEq)]
#[error("{summary}")]
pub struct ValidationFailure {
    /// Diagnostic label of the call that failed
    pub label: String,
    /// Underlying engine or parser output
    pub raw: String,
    /// One-line human-readable description
    pub summary: String,
    pub field_errors: FieldErrors,
}

impl ValidationFailure {
    pub fn new(
        label: &str,
        raw: impl Into<String>,
        field_errors: FieldErrors,
        context: Option<&str>,
    ) -> Self {
        let summary = summarize(label, &field_errors, context);
        Self {
            label: label.to_string(),
            raw: raw.into(),
            summary,
            field_errors,
        }
    }

    /// Failure with a single message against one path
    pub fn single(
        label: &str,
        path: &str,
        message: impl Into<String>,
        context: Option<&str>,
    ) -> Self {
        let message = message.into();
        let mut field_errors = FieldErrors::new();
        field_errors.insert(path.to_string(), vec![message.clone()]);
        Self::new(label, message, field_errors, context)
    }

    pub fn messages_for(&self, path: &str) -> Option<&[String]> {
        self.field_errors.get(path).map(Vec::as_slice)
    }

    /// Every path that carries at least one message
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.field_errors.keys().map(String::as_str)
    }

    /// Total number of messages across all paths
    pub fn error_count(&self) -> usize {
        self.field_errors.values().map(Vec::len).sum()
    }
}

fn summarize(label: &str, field_errors: &FieldErrors, context: Option<&str>) -> String {
    let details = field_errors
        .iter()
        .map(|(path, messages)| format!("{path}: {}", messages.join(", ")))
        .collect::<Vec<_>>()
        .join("; ");

    match context {
        Some(context) => format!("{label} validation failed ({context}): {details}"),
        None => format!("{label} validation failed: {details}"),
    }
}

/// Shared validation state: schema cache, capability registry and counters
#[derive(Debug, Default)]
pub struct ValidationContext {
    schemas: Mutex<HashMap<String, CompiledSchema>>,
    capabilities: CapabilityRegistry,
    metrics: ValidationMetrics,
}

impl ValidationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capabilities(capabilities: CapabilityRegistry) -> Self {
        Self {
            capabilities,
            ..Self::default()
        }
    }

    pub fn capabilities(&self) -> &CapabilityRegistry {
        &self.capabilities
    }

    pub fn metrics(&self) -> &ValidationMetrics {
        &self.metrics
    }

    /// Compiled schema of `T`, compiled on first use
    pub fn schema_for<T: Contract>(&self) -> Result<CompiledSchema, SchemaError> {
        let name = T::schema_name();
        let mut schemas = self
            .schemas
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(schema) = schemas.get(&name) {
            return Ok(schema.clone());
        }

        let compiled = CompiledSchema::for_type::<T>()?;
        debug!(schema = %name, "Compiled schema");
        schemas.insert(name, compiled.clone());
        Ok(compiled)
    }

    /// Validate `raw` as a `T`
    pub fn validate<T: Contract>(
        &self,
        raw: &Value,
        label: &str,
        context: Option<&str>,
    ) -> ValidationResult<T> {
        self.timed(label, || self.run::<T>(raw, label, context))
    }

    /// Parse `text` as JSON and validate it as a `T`
    pub fn validate_json<T: Contract>(
        &self,
        text: &str,
        label: &str,
        context: Option<&str>,
    ) -> ValidationResult<T> {
        self.timed(label, || {
            let raw: Value = serde_json::from_str(text).map_err(|e| {
                ValidationFailure::single(label, ROOT_PATH, format!("Invalid JSON: {e}"), context)
            })?;
            self.run::<T>(&raw, label, context)
        })
    }

    /// Validate `raw` against an arbitrary compiled schema, structurally only
    pub fn validate_against(
        &self,
        schema: &CompiledSchema,
        raw: &Value,
        label: &str,
        context: Option<&str>,
    ) -> ValidationResult<Value> {
        self.timed(label, || {
            let violations = schema.collect_errors(raw);
            if violations.is_empty() {
                Ok(raw.clone())
            } else {
                Err(ValidationFailure::new(
                    label,
                    violations.raw.join("; "),
                    violations.field_errors,
                    context,
                ))
            }
        })
    }

    /// Classify `raw` into exactly one response event variant by its `content_type`
    pub fn validate_response_event(
        &self,
        raw: &Value,
        context: Option<&str>,
    ) -> ValidationResult<ResponseEvent> {
        self.timed(RESPONSE_EVENT_LABEL, || {
            let Some(object) = raw.as_object() else {
                return Err(ValidationFailure::single(
                    RESPONSE_EVENT_LABEL,
                    ROOT_PATH,
                    format!("Expected object, received {}", json_type_name(raw)),
                    context,
                ));
            };

            let discriminator = object.get("content_type");
            let kind = match discriminator.and_then(Value::as_str).map(str::parse::<ContentType>) {
                Some(Ok(kind)) => kind,
                _ => return Err(invalid_discriminator(discriminator, context)),
            };

            match kind {
                ContentType::Json => self
                    .run::<DocumentEvent>(raw, RESPONSE_EVENT_LABEL, context)
                    .map(ResponseEvent::Document),
                ContentType::TextBlock => self
                    .run::<TextBlockEvent>(raw, RESPONSE_EVENT_LABEL, context)
                    .map(ResponseEvent::TextBlock),
                ContentType::TextStream => self
                    .run::<TextChunkEvent>(raw, RESPONSE_EVENT_LABEL, context)
                    .map(ResponseEvent::TextChunk),
                ContentType::Error => self
                    .run::<ErrorEvent>(raw, RESPONSE_EVENT_LABEL, context)
                    .map(ResponseEvent::Error),
                ContentType::Done => self
                    .run::<DoneEvent>(raw, RESPONSE_EVENT_LABEL, context)
                    .map(ResponseEvent::Done),
            }
        })
    }

    /// Validate a capability envelope using the schema registered for `expected`
    pub fn validate_capability(
        &self,
        expected: &str,
        raw: &Value,
    ) -> ValidationResult<CapabilityEnvelope> {
        match self.capabilities.get(expected) {
            Some(schema) => self.validate_capability_with(expected, raw, schema),
            None => {
                let label = capability_label(expected);
                let failure = ValidationFailure::single(
                    &label,
                    "capability",
                    format!("No payload schema registered for capability '{expected}'"),
                    None,
                );
                self.metrics.record(&label, Default::default(), false);
                warn!(capability = expected, "Unknown capability");
                Err(failure)
            }
        }
    }

    /// Validate a capability envelope against a caller-supplied payload schema
    ///
    /// The envelope tag is checked first; the payload is only inspected once the tag
    /// names `expected`.
    pub fn validate_capability_with(
        &self,
        expected: &str,
        raw: &Value,
        payload_schema: &CompiledSchema,
    ) -> ValidationResult<CapabilityEnvelope> {
        let label = capability_label(expected);
        self.timed(&label, || {
            let envelope = self.run::<CapabilityEnvelope>(raw, &label, Some(expected))?;

            if envelope.capability != expected {
                return Err(ValidationFailure::single(
                    &label,
                    "capability",
                    format!(
                        "Invalid literal value, expected \"{expected}\", received \"{}\"",
                        envelope.capability
                    ),
                    Some(expected),
                ));
            }

            let violations = payload_schema.collect_errors(&envelope.request_payload);
            if !violations.is_empty() {
                return Err(ValidationFailure::new(
                    &label,
                    violations.raw.join("; "),
                    prefix_paths(violations.field_errors, "request_payload"),
                    Some(expected),
                ));
            }

            Ok(envelope)
        })
    }

    /// Average time and call count per label since the last reset
    pub fn performance_summary(&self) -> BTreeMap<String, SchemaTimingSnapshot> {
        self.metrics.summary()
    }

    pub fn reset_metrics(&self) {
        self.metrics.reset();
    }

    fn timed<T>(
        &self,
        label: &str,
        f: impl FnOnce() -> ValidationResult<T>,
    ) -> ValidationResult<T> {
        let _span = crate::validation_span!(label).entered();
        let started = Instant::now();
        let result = f();
        self.metrics.record(label, started.elapsed(), result.is_ok());

        if let Err(failure) = &result {
            warn!(
                label,
                errors = failure.error_count(),
                summary = %failure.summary,
                "Validation failed"
            );
        }
        result
    }

    fn run<T: Contract>(
        &self,
        raw: &Value,
        label: &str,
        context: Option<&str>,
    ) -> ValidationResult<T> {
        let schema = self.schema_for::<T>().map_err(|e| {
            error!(label, error = %e, "Schema unavailable");
            ValidationFailure::single(label, ROOT_PATH, e.to_string(), context)
        })?;

        let violations = schema.collect_errors(raw);
        if !violations.is_empty() {
            return Err(ValidationFailure::new(
                label,
                violations.raw.join("; "),
                violations.field_errors,
                context,
            ));
        }

        let value: T = serde_json::from_value(raw.clone()).map_err(|e| {
            ValidationFailure::single(label, ROOT_PATH, e.to_string(), context)
        })?;

        let mut field_errors = FieldErrors::new();
        value.check(&mut Scope::root(current_millis(), &mut field_errors));
        if !field_errors.is_empty() {
            let raw = field_errors
                .iter()
                .flat_map(|(path, messages)| messages.iter().map(move |m| format!("{path}: {m}")))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(ValidationFailure::new(label, raw, field_errors, context));
        }

        Ok(value)
    }
}

fn capability_label(capability: &str) -> String {
    format!("capability:{capability}")
}

fn invalid_discriminator(found: Option<&Value>, context: Option<&str>) -> ValidationFailure {
    let expected = ContentType::ALL
        .iter()
        .map(|kind| format!("'{kind}'"))
        .collect::<Vec<_>>()
        .join(" | ");
    let received = match found {
        Some(Value::String(s)) => format!("'{s}'"),
        Some(other) => other.to_string(),
        None => "undefined".to_string(),
    };

    ValidationFailure::single(
        RESPONSE_EVENT_LABEL,
        "content_type",
        format!("Invalid discriminator value. Expected {expected}, received {received}"),
        context,
    )
}
