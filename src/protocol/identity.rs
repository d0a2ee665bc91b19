//! Agent identity used as the `source` of emitted events

use crate::protocol::identifier::Identifier;
use serde::{Deserialize, Serialize};

/// Who is producing events
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: Identifier,
    pub name: String,
}

impl Identity {
    /// Create an identity with a freshly allocated identifier
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Identifier::generate(),
            name: name.into(),
        }
    }

    /// Label written into each event's `source` field
    pub fn source(&self) -> String {
        self.id.to_string()
    }
}
