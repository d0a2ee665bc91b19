//! Validation pipeline behavior as seen by callers
//!
//! Focuses on the diagnostics a caller receives: which paths fail and with what message.


use sentient_agent_client::protocol::{ResponseEvent, Session};
use sentient_agent_client::validation::capability::CapabilityRegistry;
use sentient_agent_client::validation::{ValidationContext, RESPONSE_EVENT_LABEL};
use serde_json::json;
use test_helpers::{text_block, text_chunk, FUTURE_ID, PAST_ID};

#[test]
fn test_each_content_type_selects_its_variant() {
    let context = ValidationContext::new();
    let cases = [
        (
            json!({"content_type": "atomic.json", "id": PAST_ID, "event_name": "sources",
                   "source": "agent", "content": {"urls": ["https://example.com"]}}),
            "atomic.json",
        ),
        (text_block("hi"), "atomic.textblock"),
        (text_chunk("s1", "hi", false), "chunked.text"),
        (
            json!({"content_type": "atomic.error", "id": PAST_ID, "source": "agent",
                   "content": {"error_message": "boom"}}),
            "atomic.error",
        ),
        (json!({"content_type": "atomic.done"}), "atomic.done"),
    ];

    for (raw, expected) in cases {
        let event = context.validate_response_event(&raw, None).unwrap();
        assert_eq!(event.content_type().as_str(), expected);
    }
}

#[test]
fn test_missing_fields_are_reported_together() {
    let context = ValidationContext::new();
    let failure = context
        .validate_response_event(
            &json!({"content_type": "chunked.text", "id": PAST_ID, "content": "x"}),
            Some("frame 1"),
        )
        .unwrap_err();

    assert_eq!(failure.label, RESPONSE_EVENT_LABEL);
    for field in ["event_name", "source", "stream_id", "is_complete"] {
        assert_eq!(
            failure.messages_for(field),
            Some(&["Required".to_string()][..]),
            "missing diagnostic for {field}"
        );
    }
    assert!(failure.summary.contains("frame 1"));
}

#[test]
fn test_wrong_types_name_both_sides() {
    let context = ValidationContext::new();
    let mut raw = text_chunk("s1", "x", false);
    raw["is_complete"] = json!("yes");

    let failure = context.validate_response_event(&raw, None).unwrap_err();
    assert_eq!(
        failure.messages_for("is_complete"),
        Some(&["Expected boolean, received string".to_string()][..])
    );
}

#[test]
fn test_unknown_discriminator() {
    let context = ValidationContext::new();
    let failure = context
        .validate_response_event(&json!({"content_type": "atomic.video"}), None)
        .unwrap_err();
    let messages = failure.messages_for("content_type").unwrap();
    assert!(messages[0].starts_with("Invalid discriminator value"));
    assert!(messages[0].ends_with("received 'atomic.video'"));

    let failure = context
        .validate_response_event(&json!({"id": PAST_ID}), None)
        .unwrap_err();
    assert!(failure.messages_for("content_type").unwrap()[0].ends_with("received undefined"));
}

#[test]
fn test_non_object_payload() {
    let context = ValidationContext::new();
    let failure = context
        .validate_response_event(&json!([1, 2]), None)
        .unwrap_err();
    assert_eq!(
        failure.messages_for("(root)"),
        Some(&["Expected object, received array".to_string()][..])
    );
}

#[test]
fn test_future_identifier_rejected() {
    let context = ValidationContext::new();
    let mut raw = text_block("hi");
    raw["id"] = json!(FUTURE_ID);

    let failure = context.validate_response_event(&raw, None).unwrap_err();
    let messages = failure.messages_for("id").unwrap();
    assert!(messages[0].contains("in the future"));
}

#[test]
fn test_error_event_name_is_fixed() {
    let context = ValidationContext::new();
    let raw = json!({
        "content_type": "atomic.error",
        "id": PAST_ID,
        "event_name": "oops",
        "source": "agent",
        "content": {"error_message": "boom"}
    });
    let failure = context.validate_response_event(&raw, None).unwrap_err();
    assert_eq!(
        failure.messages_for("event_name"),
        Some(&["Invalid literal value, expected \"error\", received \"oops\"".to_string()][..])
    );
}

#[test]
fn test_defaults_are_applied() {
    let context = ValidationContext::new();
    let event = context
        .validate_response_event(
            &json!({"content_type": "atomic.error", "id": PAST_ID, "source": "agent",
                    "content": {"error_message": "boom"}}),
            None,
        )
        .unwrap();
    match event {
        ResponseEvent::Error(error) => {
            assert_eq!(error.event_name, "error");
            assert_eq!(error.schema_version, "1.0");
            assert_eq!(error.content.error_code, 500);
        }
        other => panic!("expected error event, got {other:?}"),
    }
}

#[test]
fn test_session_json_paths_are_nested() {
    let context = ValidationContext::new();
    let text = json!({
        "processor_id": "p",
        "activity_id": PAST_ID,
        "request_id": PAST_ID,
        "interactions": [{"request": {"sender": "u", "event": {"id": PAST_ID}}, "responses": []}]
    })
    .to_string();

    let failure = context
        .validate_json::<Session>(&text, "Session", None)
        .unwrap_err();
    assert!(failure.messages_for("interactions.0.request.event.prompt").is_some());

    let failure = context
        .validate_json::<Session>("{not json", "Session", None)
        .unwrap_err();
    assert!(failure.messages_for("(root)").unwrap()[0].starts_with("Invalid JSON"));
}

#[test]
fn test_nested_response_event_errors_are_keyed_by_field() {
    let context = ValidationContext::new();
    let mut answer = text_block("hi");
    answer["source"] = json!("");
    let text = json!({
        "processor_id": "p",
        "activity_id": PAST_ID,
        "request_id": PAST_ID,
        "interactions": [{
            "request": {"sender": "u", "event": {"id": PAST_ID, "prompt": "hello"}},
            "responses": [{"event": answer}]
        }]
    })
    .to_string();

    let failure = context
        .validate_json::<Session>(&text, "Session", None)
        .unwrap_err();
    assert_eq!(
        failure.messages_for("interactions.0.responses.0.event.source"),
        Some(&["String must contain at least 1 character(s)".to_string()][..])
    );
    assert!(failure.messages_for("interactions.0.responses.0.event").is_none());
}

#[test]
fn test_nested_response_event_with_unknown_kind() {
    let context = ValidationContext::new();
    let mut answer = text_block("hi");
    answer["content_type"] = json!("atomic.unknown");
    let text = json!({
        "processor_id": "p",
        "activity_id": PAST_ID,
        "request_id": PAST_ID,
        "interactions": [{
            "request": {"sender": "u", "event": {"id": PAST_ID, "prompt": "hello"}},
            "responses": [{"event": answer}]
        }]
    })
    .to_string();

    let failure = context
        .validate_json::<Session>(&text, "Session", None)
        .unwrap_err();
    let messages = failure
        .messages_for("interactions.0.responses.0.event.content_type")
        .unwrap();
    assert!(messages[0].starts_with("Invalid enum value"));
}

#[test]
fn test_error_code_outside_32_bit_range() {
    let context = ValidationContext::new();
    for code in [json!(3_000_000_000_u64), json!(-3_000_000_000_i64)] {
        let raw = json!({
            "content_type": "atomic.error",
            "id": PAST_ID,
            "source": "agent",
            "content": {"error_message": "boom", "error_code": code}
        });
        let failure = context.validate_response_event(&raw, None).unwrap_err();
        let messages = failure.messages_for("content.error_code").unwrap();
        assert!(messages[0].starts_with("Number must be"), "{messages:?}");
        assert!(failure.messages_for("(root)").is_none());
    }

    let raw = json!({
        "content_type": "atomic.error",
        "id": PAST_ID,
        "source": "agent",
        "content": {"error_message": "boom", "error_code": i32::MAX}
    });
    assert!(context.validate_response_event(&raw, None).is_ok());
}

#[test]
fn test_capability_envelope_checks() {
    let mut registry = CapabilityRegistry::new();
    registry
        .register(
            "search",
            json!({
                "type": "object",
                "properties": {"terms": {"type": "array", "minItems": 1}},
                "required": ["terms"]
            }),
        )
        .unwrap();
    let context = ValidationContext::with_capabilities(registry);

    let ok = context
        .validate_capability(
            "search",
            &json!({"capability": "search", "request_payload": {"terms": ["rust"]}}),
        )
        .unwrap();
    assert_eq!(ok.capability, "search");

    let wrong_tag = context
        .validate_capability(
            "search",
            &json!({"capability": "summarize", "request_payload": {"terms": ["rust"]}}),
        )
        .unwrap_err();
    assert_eq!(wrong_tag.label, "capability:search");
    assert!(wrong_tag.messages_for("capability").is_some());

    let empty_terms = context
        .validate_capability(
            "search",
            &json!({"capability": "search", "request_payload": {"terms": []}}),
        )
        .unwrap_err();
    assert_eq!(
        empty_terms.messages_for("request_payload.terms"),
        Some(&["Array must contain at least 1 item(s)".to_string()][..])
    );

    let unknown = context
        .validate_capability("translate", &json!({"capability": "translate", "request_payload": {}}))
        .unwrap_err();
    assert!(unknown.messages_for("capability").unwrap()[0].contains("No payload schema"));
}

#[test]
fn test_metrics_track_failures() {
    let context = ValidationContext::new();
    context.validate_response_event(&text_block("ok"), None).unwrap();
    let _ = context.validate_response_event(&json!(null), None);

    let summary = context.performance_summary();
    let stats = &summary[RESPONSE_EVENT_LABEL];
    assert_eq!(stats.calls, 2);
    assert_eq!(stats.failures, 1);

    context.reset_metrics();
    assert!(context.performance_summary().is_empty());
}
