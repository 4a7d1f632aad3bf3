use chat_types::Source;
use inference_api::{interpret_payload, StreamEvent, ToolStatus, Usage};

#[test]
fn content_and_usage_in_one_frame_yield_both_events() {
    let events = interpret_payload(
        r#"{"choices":[{"delta":{"content":"!"}}],"usage":{"prompt_tokens":4,"completion_tokens":8,"total_tokens":12}}"#,
    );

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta {
                text: "!".to_string()
            },
            StreamEvent::Usage(Usage {
                prompt_tokens: 4,
                completion_tokens: 8,
                total_tokens: 12,
                tokens_per_second: None,
            }),
        ]
    );
}

#[test]
fn tool_status_frame_does_not_leak_content() {
    let events = interpret_payload(
        r#"{"choices":[{"delta":{"used_tool":true,"status":"tool_output","content":"[{\"title\":\"Rust\",\"url\":\"https://rust-lang.org\",\"snippet\":\"A language\"}]"}}]}"#,
    );

    assert_eq!(
        events,
        vec![StreamEvent::ToolStatus(ToolStatus {
            name: None,
            status: "tool_output".to_string(),
            sources: vec![Source::new("Rust", "https://rust-lang.org").with_snippet("A language")],
        })]
    );
}

#[test]
fn tool_error_status_is_detected() {
    let events = interpret_payload(
        r#"{"choices":[{"delta":{"used_tool":true,"status":"error","tool_name":"System Error: boom"}}]}"#,
    );

    let [StreamEvent::ToolStatus(status)] = events.as_slice() else {
        panic!("expected a single tool status, got {events:?}");
    };
    assert!(status.is_error());
    assert_eq!(status.name.as_deref(), Some("System Error: boom"));
}

#[test]
fn openai_tool_call_delta_maps_to_thinking_status() {
    let events = interpret_payload(
        r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","function":{"name":"web_search","arguments":""}}]}}]}"#,
    );

    assert_eq!(
        events,
        vec![StreamEvent::ToolStatus(ToolStatus {
            name: Some("web_search".to_string()),
            status: "thinking".to_string(),
            sources: Vec::new(),
        })]
    );
}

#[test]
fn text_beside_a_tool_call_is_emitted_before_the_status() {
    let events = interpret_payload(
        r#"{"choices":[{"delta":{"content":"Let me check.","tool_calls":[{"index":0,"function":{"name":"get_system_info","arguments":""}}]}}]}"#,
    );

    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta {
                text: "Let me check.".to_string()
            },
            StreamEvent::ToolStatus(ToolStatus {
                name: Some("get_system_info".to_string()),
                status: "thinking".to_string(),
                sources: Vec::new(),
            }),
        ]
    );
}

#[test]
fn zero_usage_frame_is_not_meaningful() {
    let events = interpret_payload(
        r#"{"choices":[],"usage":{"prompt_tokens":0,"completion_tokens":0,"total_tokens":0}}"#,
    );

    let [StreamEvent::Usage(usage)] = events.as_slice() else {
        panic!("expected a single usage event, got {events:?}");
    };
    assert!(!usage.is_meaningful());
}

#[test]
fn non_positive_server_rate_is_dropped() {
    let events = interpret_payload(
        r#"{"usage":{"total_tokens":3},"timings":{"predicted_per_second":0.0}}"#,
    );
    assert_eq!(
        events,
        vec![StreamEvent::Usage(Usage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 3,
            tokens_per_second: None,
        })]
    );
}

#[test]
fn malformed_payload_is_unparseable() {
    let events = interpret_payload("{\"choices\":");
    assert!(matches!(
        events.as_slice(),
        [StreamEvent::Unparseable { payload, .. }] if payload == "{\"choices\":"
    ));
}

#[test]
fn stream_event_serializes_with_type_tag() {
    let json = serde_json::to_value(StreamEvent::ContentDelta {
        text: "hi".to_string(),
    })
    .expect("serialize event");
    assert_eq!(json["type"], "content_delta");
    assert_eq!(json["text"], "hi");
}
