//! Session history across several queries
//!
//! The session sent with each request must carry every earlier interaction, and a
//! serialized session must validate and resume cleanly.


use sentient_agent_client::client::AgentClient;
use sentient_agent_client::ledger::SessionLedger;
use sentient_agent_client::protocol::{Session, TextBlockEvent};
use sentient_agent_client::protocol::ResponseEvent;
use sentient_agent_client::testing::{MockTransport, ScriptedByteSource};
use sentient_agent_client::validation::ValidationContext;
use std::sync::Arc;
use test_helpers::{done, text_block, wire};

fn reply(content: &str) -> ScriptedByteSource {
    ScriptedByteSource::from_chunks([wire(&[text_block(content), done()])])
}

#[tokio::test]
async fn test_history_is_sent_with_each_query() {
    let transport = MockTransport::replying(reply("first answer"));
    transport.push_response(reply("second answer")).await;

    let client = AgentClient::new(
        transport.clone(),
        Arc::new(ValidationContext::new()),
        SessionLedger::new("test-processor"),
        "tester",
    )
    .with_recipients(vec!["research-agent".to_string()]);

    client.query("first").await.unwrap().collect_events().await.unwrap();
    client.query("second").await.unwrap().collect_events().await.unwrap();

    let requests = transport.get_requests().await;
    assert_eq!(requests.len(), 2);
    assert!(requests[0].session.interactions.is_empty());
    assert_eq!(requests[1].session.interactions.len(), 1);
    assert_eq!(requests[1].session.interactions[0].request.event.prompt, "first");
    assert_eq!(requests[1].session.interactions[0].responses.len(), 2);
    assert_eq!(
        requests[0].session.activity_id,
        requests[1].session.activity_id
    );
    for request in &requests {
        assert_eq!(request.session.request_id, request.query.id);
    }
    assert_ne!(requests[0].session.request_id, requests[1].session.request_id);

    let session = client.session();
    assert_eq!(session.interactions.len(), 2);
    assert_eq!(
        session.interactions[1].request.recipients.as_deref(),
        Some(&["research-agent".to_string()][..])
    );
    match &session.interactions[1].responses[0].event {
        ResponseEvent::TextBlock(TextBlockEvent { content, .. }) => {
            assert_eq!(content, "second answer")
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn test_serialized_session_validates_and_resumes() {
    let transport = MockTransport::replying(reply("answer"));
    let client = AgentClient::new(
        transport,
        Arc::new(ValidationContext::new()),
        SessionLedger::new("test-processor"),
        "tester",
    );
    client.query("hello").await.unwrap().collect_events().await.unwrap();

    let text = serde_json::to_string(&client.session()).unwrap();
    let context = ValidationContext::new();
    let session = context
        .validate_json::<Session>(&text, "Session", None)
        .unwrap();
    assert_eq!(session, client.session());

    let resumed = SessionLedger::resume(session);
    assert_eq!(resumed.interaction_count(), 1);
    assert!(resumed.last_interaction().unwrap().is_complete());
}
