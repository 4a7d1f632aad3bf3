use inference_api::{EventStreamDecoder, FrameDecoder, StreamEvent, ToolStatus, Usage};

const STREAM: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"used_tool\":true,\"status\":\"thinking\",\"tool_name\":\"web_search\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Hej \"}}]}\n\n",
    ": keep-alive\n\n",
    "data: data: {\"choices\":[{\"delta\":{\"content\":\"värld 🌍\"}}]}\n\n",
    "data: {broken-json\n\n",
    "data: {\"choices\":[],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":3,\"total_tokens\":8},\"timings\":{\"predicted_per_second\":41.5}}\n\n",
    "data: [DONE]\n\n",
);

fn expected_events() -> Vec<StreamEvent> {
    vec![
        StreamEvent::ToolStatus(ToolStatus {
            name: Some("web_search".to_string()),
            status: "thinking".to_string(),
            sources: Vec::new(),
        }),
        StreamEvent::ContentDelta {
            text: "Hej ".to_string(),
        },
        StreamEvent::ContentDelta {
            text: "värld 🌍".to_string(),
        },
        StreamEvent::Unparseable {
            payload: "{broken-json".to_string(),
            reason: String::new(),
        },
        StreamEvent::Usage(Usage {
            prompt_tokens: 5,
            completion_tokens: 3,
            total_tokens: 8,
            tokens_per_second: Some(41.5),
        }),
        StreamEvent::Done,
    ]
}

/// Parse failure reasons depend on serde_json wording; compare payloads only.
fn normalized(events: Vec<StreamEvent>) -> Vec<StreamEvent> {
    events
        .into_iter()
        .map(|event| match event {
            StreamEvent::Unparseable { payload, .. } => StreamEvent::Unparseable {
                payload,
                reason: String::new(),
            },
            other => other,
        })
        .collect()
}

fn decode_in_chunks(input: &[u8], chunk_size: usize) -> Vec<StreamEvent> {
    let mut decoder = EventStreamDecoder::default();
    let mut events = Vec::new();
    for chunk in input.chunks(chunk_size) {
        events.extend(decoder.feed(chunk).events);
    }
    events.extend(decoder.finish().events);
    events
}

#[test]
fn whole_body_decodes_into_expected_events() {
    let events = EventStreamDecoder::decode_all(STREAM.as_bytes());
    assert_eq!(normalized(events), expected_events());
}

#[test]
fn chunk_boundaries_do_not_change_decoded_events() {
    let whole = normalized(EventStreamDecoder::decode_all(STREAM.as_bytes()));

    for chunk_size in 1..=STREAM.len() {
        let chunked = normalized(decode_in_chunks(STREAM.as_bytes(), chunk_size));
        assert_eq!(chunked, whole, "chunk size {chunk_size} diverged");
    }
}

#[test]
fn double_prefixed_line_decodes_like_single_prefix() {
    let single = EventStreamDecoder::decode_all(
        b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
    );
    let double = EventStreamDecoder::decode_all(
        b"data: data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n",
    );
    assert_eq!(single, double);
}

#[test]
fn sentinel_halts_processing_within_same_chunk() {
    let mut decoder = EventStreamDecoder::default();
    let batch = decoder.feed(
        concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
            "data: [DONE]\n",
            "data: {not json\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n",
        )
        .as_bytes(),
    );

    assert!(batch.done);
    assert_eq!(
        batch.events,
        vec![
            StreamEvent::ContentDelta {
                text: "a".to_string()
            },
            StreamEvent::Done,
        ]
    );
    assert!(decoder.finish().events.is_empty());
}

#[test]
fn sentinel_is_case_sensitive() {
    let mut decoder = FrameDecoder::default();
    let batch = decoder.feed(b"data: [done]\n");
    assert!(!batch.done);
    assert_eq!(batch.payloads, vec!["[done]".to_string()]);
}

#[test]
fn body_close_without_sentinel_emits_single_done() {
    let mut decoder = EventStreamDecoder::default();
    assert!(decoder
        .feed(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}")
        .events
        .is_empty());

    let batch = decoder.finish();
    assert_eq!(
        batch.events,
        vec![
            StreamEvent::ContentDelta {
                text: "tail".to_string()
            },
            StreamEvent::Done,
        ]
    );
    assert!(decoder.finish().events.is_empty());
}

#[test]
fn crlf_line_endings_are_trimmed() {
    let events = EventStreamDecoder::decode_all(
        b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\r\n\r\ndata: [DONE]\r\n",
    );
    assert_eq!(
        events,
        vec![
            StreamEvent::ContentDelta {
                text: "ok".to_string()
            },
            StreamEvent::Done,
        ]
    );
}
