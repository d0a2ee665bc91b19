//! Agent client
//!
//! [`AgentClient`] issues queries against one agent over a [`Transport`] and returns a
//! [`ResponseStream`] per query. Outbound payloads are validated before they are sent,
//! and the interaction is only recorded once the transport accepted the request.

pub mod stream;

use crate::error::ClientResult;
use crate::ledger::SessionLedger;
use crate::protocol::request::{CapabilityEnvelope, Query, RequestBody};
use crate::protocol::session::{RequestMessage, Session};
use crate::transport::sse::FramingPolicy;
use crate::transport::Transport;
use crate::validation::ValidationContext;
use std::sync::Arc;
use tracing::{info, Instrument};

pub use stream::{ResponseStream, StreamError, StreamState};

/// Client bound to one agent endpoint and one session
pub struct AgentClient<T: Transport> {
    transport: T,
    context: Arc<ValidationContext>,
    ledger: SessionLedger,
    sender: String,
    recipients: Option<Vec<String>>,
    policy: FramingPolicy,
}

impl<T: Transport> AgentClient<T> {
    pub fn new(
        transport: T,
        context: Arc<ValidationContext>,
        ledger: SessionLedger,
        sender: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            context,
            ledger,
            sender: sender.into(),
            recipients: None,
            policy: FramingPolicy::default(),
        }
    }

    pub fn with_framing_policy(mut self, policy: FramingPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Recipients recorded on every request message
    pub fn with_recipients(mut self, recipients: Vec<String>) -> Self {
        self.recipients = Some(recipients);
        self
    }

    /// Ask the agent `prompt`
    pub async fn query(&self, prompt: &str) -> ClientResult<ResponseStream<T::Source>> {
        self.send(Query::new(prompt)).await
    }

    /// Ask the agent `prompt` with a capability payload
    ///
    /// The envelope must satisfy the schema registered for its capability.
    pub async fn query_with_capability(
        &self,
        prompt: &str,
        envelope: CapabilityEnvelope,
    ) -> ClientResult<ResponseStream<T::Source>> {
        self.send(Query::new(prompt).with_capability(envelope)).await
    }

    /// Validate and send a prepared query
    pub async fn send(&self, query: Query) -> ClientResult<ResponseStream<T::Source>> {
        let span = crate::request_span!(query_id = %query.id);
        self.send_inner(query).instrument(span).await
    }

    async fn send_inner(&self, query: Query) -> ClientResult<ResponseStream<T::Source>> {
        let query: Query = self
            .context
            .validate(&serde_json::to_value(&query)?, "Query", Some("outbound"))?;

        if let Some(envelope) = &query.content {
            let raw = serde_json::to_value(envelope)?;
            self.context.validate_capability(&envelope.capability, &raw)?;
        }

        // The outgoing session names the request it travels with
        let mut session = self.ledger.snapshot();
        session.request_id = query.id.clone();
        let body = RequestBody {
            query: query.clone(),
            session,
        };
        let body: RequestBody = self.context.validate(
            &serde_json::to_value(&body)?,
            "RequestBody",
            Some("outbound"),
        )?;

        let source = self.transport.open(&body).await?;

        let request_id = query.id.clone();
        let index = self.ledger.begin_interaction(RequestMessage {
            sender: self.sender.clone(),
            recipients: self.recipients.clone(),
            event: query,
        });
        info!(interaction = index, "Query accepted by agent");

        Ok(ResponseStream::new(source, Arc::clone(&self.context))
            .with_ledger(self.ledger.clone())
            .with_policy(self.policy)
            .for_request(&request_id))
    }

    /// Read-only copy of the session
    pub fn session(&self) -> Session {
        self.ledger.snapshot()
    }

    pub fn ledger(&self) -> &SessionLedger {
        &self.ledger
    }

    pub fn context(&self) -> &Arc<ValidationContext> {
        &self.context
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::protocol::events::ResponseEvent;
    use crate::testing::{MockTransport, ScriptedByteSource};
    use crate::transport::TransportError;
    use crate::validation::capability::CapabilityRegistry;
    use serde_json::json;

    fn client(transport: MockTransport) -> AgentClient<MockTransport> {
        AgentClient::new(
            transport,
            Arc::new(ValidationContext::new()),
            SessionLedger::new("processor"),
            "tester",
        )
    }

    #[tokio::test]
    async fn test_query_records_interaction_and_responses() {
        let transport = MockTransport::replying(ScriptedByteSource::from_chunks([
            "event: atomic.done\ndata: {}\n\n",
        ]));
        let client = client(transport.clone());

        let events = client.query("hello").await.unwrap().collect_events().await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ResponseEvent::Done(_)));

        let session = client.session();
        assert_eq!(session.interactions.len(), 1);
        assert_eq!(session.interactions[0].request.sender, "tester");
        assert_eq!(session.interactions[0].responses.len(), 1);
        assert_eq!(session.request_id, session.interactions[0].request.event.id);

        let sent = transport.get_requests().await;
        assert_eq!(sent[0].query.prompt, "hello");
        assert!(sent[0].session.interactions.is_empty());
        assert_eq!(sent[0].session.request_id, sent[0].query.id);
    }

    #[tokio::test]
    async fn test_failed_open_records_nothing() {
        let client = client(MockTransport::with_failure());
        let err = client.query("hello").await.err().unwrap();
        assert!(matches!(
            err,
            ClientError::Transport(TransportError::Status { status: 500, .. })
        ));
        assert_eq!(client.ledger().interaction_count(), 0);
    }

    #[tokio::test]
    async fn test_empty_prompt_rejected_before_sending() {
        let transport = MockTransport::new();
        let client = client(transport.clone());

        let err = client.query("").await.err().unwrap();
        match err {
            ClientError::Validation(failure) => {
                assert!(failure.messages_for("prompt").is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(transport.get_requests().await.is_empty());
    }

    #[tokio::test]
    async fn test_capability_payload_checked_against_registry() {
        let mut registry = CapabilityRegistry::new();
        registry
            .register("search", json!({"type": "object", "required": ["terms"]}))
            .unwrap();
        let transport = MockTransport::new();
        let client = AgentClient::new(
            transport.clone(),
            Arc::new(ValidationContext::with_capabilities(registry)),
            SessionLedger::new("processor"),
            "tester",
        );

        let err = client
            .query_with_capability("find", CapabilityEnvelope::new("search", json!({})))
            .await
            .err()
            .unwrap();
        match err {
            ClientError::Validation(failure) => {
                assert!(failure.messages_for("request_payload.terms").is_some());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(transport.get_requests().await.is_empty());
    }
}
