//! Outbound request types
//!
//! A [`Query`] is what the client asks; the [`RequestBody`] pairs it with the current
//! [`Session`] and is POSTed as JSON.

use crate::protocol::identifier::Identifier;
use crate::protocol::session::Session;
use crate::validation::contract::{Contract, Scope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tagged payload naming the capability contract it must satisfy
///
/// # Examples
/// ```
/// use sentient_agent_client::protocol::CapabilityEnvelope;
/// use serde_json::json;
///
/// let envelope = CapabilityEnvelope::new("search", json!({"terms": ["rust"]}));
/// assert_eq!(envelope.capability, "search");
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct CapabilityEnvelope {
    #[schemars(length(min = 1))]
    pub capability: String,
    pub request_payload: Value,
}

impl CapabilityEnvelope {
    pub fn new(capability: impl Into<String>, request_payload: Value) -> Self {
        Self {
            capability: capability.into(),
            request_payload,
        }
    }
}

impl Contract for CapabilityEnvelope {}

/// Request event sent to the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Query {
    pub id: Identifier,
    #[schemars(length(min = 1))]
    pub prompt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<CapabilityEnvelope>,
}

impl Query {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            id: Identifier::generate(),
            prompt: prompt.into(),
            content: None,
        }
    }

    pub fn with_capability(mut self, envelope: CapabilityEnvelope) -> Self {
        self.content = Some(envelope);
        self
    }
}

impl Contract for Query {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.identifier("id", &self.id);
    }
}

/// JSON body POSTed to the agent endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestBody {
    pub query: Query,
    pub session: Session,
}

impl Contract for RequestBody {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.nested("query", &self.query);
        scope.nested("session", &self.session);
    }
}
