//! ULID identifiers for events, queries and sessions
//!
//! Identifiers are 26-character Crockford base32 strings whose first 48 bits encode
//! the creation time in milliseconds. Lexicographic order matches creation order.

use chrono::Utc;
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject, StringValidation};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use ulid::Ulid;

/// Length of a canonical ULID string
pub const IDENTIFIER_LENGTH: usize = 26;

/// JSON Schema pattern for canonical (uppercase) ULIDs
pub const IDENTIFIER_PATTERN: &str = "^[0-7][0-9A-HJKMNP-TV-Z]{25}$";

const CROCKFORD_ALPHABET: &str = "0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Sortable, time-ordered identifier
///
/// Deserialization accepts any string so that structural problems are reported by the
/// validation pipeline with a field path; use [`Identifier::parse`] or
/// [`Identifier::verify`] for the full check.
///
/// # Examples
/// ```
/// use sentient_agent_client::protocol::Identifier;
///
/// let id = Identifier::generate();
/// assert_eq!(id.as_str().len(), 26);
/// assert!(Identifier::parse(id.as_str()).is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identifier(String);

impl Identifier {
    /// Allocate a new identifier stamped with the current time
    pub fn generate() -> Self {
        Self(Ulid::new().to_string())
    }

    /// Parse and fully verify an identifier against the current time
    pub fn parse(value: &str) -> Result<Self, IdentifierError> {
        let id = Self(value.to_string());
        id.verify(current_millis())?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check shape, alphabet and that the timestamp is not after `now_ms`
    pub fn verify(&self, now_ms: u64) -> Result<(), IdentifierError> {
        let timestamp_ms = decode_timestamp(&self.0)?;
        if timestamp_ms > now_ms {
            return Err(IdentifierError::FutureTimestamp {
                timestamp_ms,
                now_ms,
            });
        }
        Ok(())
    }

    /// Creation time in milliseconds since the Unix epoch
    pub fn timestamp_ms(&self) -> Result<u64, IdentifierError> {
        decode_timestamp(&self.0)
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Identifier {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl From<Ulid> for Identifier {
    fn from(ulid: Ulid) -> Self {
        Self(ulid.to_string())
    }
}

impl JsonSchema for Identifier {
    fn schema_name() -> String {
        "Identifier".to_string()
    }

    fn json_schema(_gen: &mut SchemaGenerator) -> Schema {
        SchemaObject {
            instance_type: Some(InstanceType::String.into()),
            string: Some(Box::new(StringValidation {
                min_length: Some(IDENTIFIER_LENGTH as u32),
                max_length: Some(IDENTIFIER_LENGTH as u32),
                pattern: Some(IDENTIFIER_PATTERN.to_string()),
            })),
            ..Default::default()
        }
        .into()
    }
}

/// Identifier verification failures
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IdentifierError {
    #[error("identifier must be {IDENTIFIER_LENGTH} characters, got {0}")]
    InvalidLength(usize),
    #[error("identifier contains invalid character '{0}'")]
    InvalidCharacter(char),
    #[error("identifier overflows 128 bits")]
    Overflow,
    #[error("identifier timestamp {timestamp_ms} is in the future (now {now_ms})")]
    FutureTimestamp { timestamp_ms: u64, now_ms: u64 },
}

fn decode_timestamp(value: &str) -> Result<u64, IdentifierError> {
    let len = value.chars().count();
    if len != IDENTIFIER_LENGTH {
        return Err(IdentifierError::InvalidLength(len));
    }
    if let Some(bad) = value.chars().find(|c| !CROCKFORD_ALPHABET.contains(*c)) {
        return Err(IdentifierError::InvalidCharacter(bad));
    }
    if value.as_bytes()[0] > b'7' {
        return Err(IdentifierError::Overflow);
    }

    let ulid = Ulid::from_string(value).map_err(|_| IdentifierError::Overflow)?;
    Ok(ulid.timestamp_ms())
}

pub(crate) fn current_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}
