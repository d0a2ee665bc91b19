//! Crate-level error type
//!
//! Each module has its own `thiserror` enum; [`ClientError`] wraps them for callers
//! that cross module boundaries. [`ClientError::to_error_content`] turns any of them
//! into the payload of an `atomic.error` event with secrets redacted.

use crate::agent::emitter::EmitterError;
use crate::client::stream::StreamError;
use crate::config::ConfigError;
use crate::ledger::LedgerError;
use crate::protocol::events::{ErrorContent, DEFAULT_ERROR_CODE};
use crate::transport::TransportError;
use crate::validation::ValidationFailure;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use thiserror::Error;

/// Longest message that leaves the process
pub const MAX_ERROR_MESSAGE_LEN: usize = 500;

const TRUNCATION_SUFFIX: &str = "...[truncated]";

static SECRET_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(password|token|key|secret)[=:]\s*\S+").expect("secret pattern is valid")
});

static SECRET_PATH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/[a-zA-Z0-9._/-]+/(secrets?|\.ssh|\.aws|\.config)/[a-zA-Z0-9._/-]+")
        .expect("secret path pattern is valid")
});

/// Main error type for client and agent operations
#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Validation(#[from] ValidationFailure),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Session ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Emitter error: {0}")]
    Emitter(#[from] EmitterError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid input: {message}")]
    InvalidInput { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl ClientError {
    /// Create invalid input error
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        Self::InvalidInput {
            message: message.into(),
        }
    }

    /// Create internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Numeric code carried by the matching error event
    pub fn error_code(&self) -> i32 {
        match self {
            ClientError::Validation(_) | ClientError::InvalidInput { .. } => 400,
            ClientError::Transport(TransportError::Status { status, .. }) => i32::from(*status),
            ClientError::Transport(_) => 502,
            ClientError::Stream(StreamError::Transport(TransportError::Status { status, .. })) => {
                i32::from(*status)
            }
            ClientError::Stream(_) => 502,
            ClientError::Ledger(_)
            | ClientError::Emitter(_)
            | ClientError::Config(_)
            | ClientError::Serialization(_)
            | ClientError::Internal { .. } => DEFAULT_ERROR_CODE,
        }
    }

    /// Convert to a sanitized error event payload
    ///
    /// Validation failures carry their per-field messages under `details.field_errors`.
    pub fn to_error_content(&self) -> ErrorContent {
        let content = ErrorContent::new(sanitize_error_message(&self.to_string()))
            .with_code(self.error_code());

        let failure = match self {
            ClientError::Validation(failure) => Some(failure),
            ClientError::Stream(StreamError::Validation(failure)) => Some(failure),
            _ => None,
        };

        match failure {
            Some(failure) => content.with_details(field_error_details(failure)),
            None => content,
        }
    }
}

fn field_error_details(failure: &ValidationFailure) -> Map<String, Value> {
    let fields: Map<String, Value> = failure
        .field_errors
        .iter()
        .map(|(path, messages)| {
            let messages = messages
                .iter()
                .map(|m| Value::String(sanitize_error_message(m)))
                .collect();
            (path.clone(), Value::Array(messages))
        })
        .collect();

    let mut details = Map::new();
    details.insert("label".to_string(), Value::String(failure.label.clone()));
    details.insert("field_errors".to_string(), Value::Object(fields));
    details
}

/// Redact secrets and secret-bearing paths, then cap the length
pub fn sanitize_error_message(message: &str) -> String {
    let sanitized = SECRET_PATTERN.replace_all(message, "${1}=***");
    let mut sanitized = SECRET_PATH_PATTERN
        .replace_all(&sanitized, "/***REDACTED***/")
        .into_owned();

    if sanitized.len() > MAX_ERROR_MESSAGE_LEN {
        let mut cut = MAX_ERROR_MESSAGE_LEN - TRUNCATION_SUFFIX.len();
        while !sanitized.is_char_boundary(cut) {
            cut -= 1;
        }
        sanitized.truncate(cut);
        sanitized.push_str(TRUNCATION_SUFFIX);
    }

    sanitized
}

/// Result type for client operations
pub type ClientResult<T> = Result<T, ClientError>;
