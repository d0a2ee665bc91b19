//! Session and interaction history
//!
//! A [`Session`] correlates every request a client issued with the events the agent
//! returned for it. Interactions are append-only; see [`crate::ledger::SessionLedger`]
//! for the mutation API.

use crate::protocol::events::ResponseEvent;
use crate::protocol::identifier::Identifier;
use crate::protocol::request::Query;
use crate::validation::contract::{Contract, Scope};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request half of an interaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RequestMessage {
    #[schemars(length(min = 1))]
    pub sender: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipients: Option<Vec<String>>,
    pub event: Query,
}

impl Contract for RequestMessage {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.nested("event", &self.event);
    }
}

/// One validated event received for a request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ResponseMessage {
    pub event: ResponseEvent,
}

impl Contract for ResponseMessage {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.nested("event", &self.event);
    }
}

/// A request paired with its ordered responses
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Interaction {
    pub request: RequestMessage,
    #[serde(default)]
    pub responses: Vec<ResponseMessage>,
}

impl Interaction {
    pub fn new(request: RequestMessage) -> Self {
        Self {
            request,
            responses: Vec::new(),
        }
    }

    /// Whether the agent already terminated this interaction
    pub fn is_complete(&self) -> bool {
        self.responses
            .last()
            .map(|r| r.event.is_done())
            .unwrap_or(false)
    }
}

impl Contract for Interaction {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.nested("request", &self.request);
        for (index, response) in self.responses.iter().enumerate() {
            scope.nested(&format!("responses.{index}"), response);
        }
    }
}

/// Correlation context spanning one client-to-agent relationship
///
/// # Examples
/// ```
/// use sentient_agent_client::protocol::Session;
///
/// let session = Session::new("sentient-agent");
/// let wire = serde_json::to_value(&session).unwrap();
/// assert_eq!(wire["processor_id"], "sentient-agent");
/// assert!(wire["interactions"].as_array().unwrap().is_empty());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Session {
    #[schemars(length(min = 1))]
    pub processor_id: String,
    pub activity_id: Identifier,
    pub request_id: Identifier,
    #[serde(default)]
    pub interactions: Vec<Interaction>,
}

impl Session {
    pub fn new(processor_id: impl Into<String>) -> Self {
        Self {
            processor_id: processor_id.into(),
            activity_id: Identifier::generate(),
            request_id: Identifier::generate(),
            interactions: Vec::new(),
        }
    }
}

impl Contract for Session {
    fn check(&self, scope: &mut Scope<'_>) {
        scope.identifier("activity_id", &self.activity_id);
        scope.identifier("request_id", &self.request_id);
        for (index, interaction) in self.interactions.iter().enumerate() {
            scope.nested(&format!("interactions.{index}"), interaction);
        }
    }
}
