use chat_types::Source;
use serde_json::Value;

use crate::events::{StreamEvent, ToolStatus, Usage};

const TOOL_OUTPUT_STATUS: &str = "tool_output";

/// Map one raw payload string into the events it carries.
///
/// A single frame may carry content and usage together, so this is not a
/// one-to-one mapping. Valid JSON without any recognised signal yields no
/// events; invalid JSON yields [`StreamEvent::Unparseable`].
pub fn interpret_payload(payload: &str) -> Vec<StreamEvent> {
    let value = match serde_json::from_str::<Value>(payload) {
        Ok(value) => value,
        Err(error) => {
            return vec![StreamEvent::Unparseable {
                payload: payload.to_owned(),
                reason: error.to_string(),
            }];
        }
    };

    let mut events = Vec::new();
    let delta = value
        .get("choices")
        .and_then(|choices| choices.get(0))
        .and_then(|choice| choice.get("delta"));

    if let Some(delta) = delta {
        // A proxy tool frame's `content` is tool payload, so it never yields text.
        if let Some(status) = proxy_tool_status(delta) {
            events.push(StreamEvent::ToolStatus(status));
        } else {
            if let Some(text) = delta
                .get("content")
                .and_then(Value::as_str)
                .filter(|text| !text.is_empty())
            {
                events.push(StreamEvent::ContentDelta {
                    text: text.to_owned(),
                });
            }
            if let Some(status) = tool_call_status(delta) {
                events.push(StreamEvent::ToolStatus(status));
            }
        }
    }

    if let Some(usage) = usage_from_value(&value) {
        events.push(StreamEvent::Usage(usage));
    }

    events
}

/// Backend proxy form: `used_tool: true` with `status` and `tool_name`.
fn proxy_tool_status(delta: &Value) -> Option<ToolStatus> {
    if delta.get("used_tool").and_then(Value::as_bool) == Some(true) {
        let status = delta
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(ToolStatus::THINKING)
            .to_owned();
        let name = delta
            .get("tool_name")
            .and_then(Value::as_str)
            .map(ToString::to_string);
        // For tool output frames `content` is the tool payload, never text.
        let sources = if status == TOOL_OUTPUT_STATUS {
            delta
                .get("content")
                .map(sources_from_tool_output)
                .unwrap_or_default()
        } else {
            Vec::new()
        };

        return Some(ToolStatus {
            name,
            status,
            sources,
        });
    }
    None
}

/// OpenAI form: the first `tool_calls` entry names the function being invoked.
fn tool_call_status(delta: &Value) -> Option<ToolStatus> {
    let name = delta
        .get("tool_calls")
        .and_then(|calls| calls.get(0))
        .and_then(|call| call.get("function"))
        .and_then(|function| function.get("name"))
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())?;

    Some(ToolStatus {
        name: Some(name.to_owned()),
        status: ToolStatus::THINKING.to_owned(),
        sources: Vec::new(),
    })
}

/// Tool output arrives either as a JSON list or as a string holding one.
fn sources_from_tool_output(content: &Value) -> Vec<Source> {
    let parsed;
    let list = match content {
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(value) => {
                parsed = value;
                &parsed
            }
            Err(_) => return Vec::new(),
        },
        other => other,
    };

    list.as_array()
        .map(|items| items.iter().filter_map(source_from_item).collect())
        .unwrap_or_default()
}

fn source_from_item(item: &Value) -> Option<Source> {
    let url = item
        .get("url")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|url| !url.is_empty())?;
    let title = item
        .get("title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .unwrap_or(url);
    let snippet = item
        .get("snippet")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|snippet| !snippet.is_empty())
        .map(ToString::to_string);

    Some(Source {
        title: title.to_owned(),
        url: url.to_owned(),
        snippet,
    })
}

fn usage_from_value(value: &Value) -> Option<Usage> {
    let usage = value.get("usage").filter(|usage| usage.is_object())?;
    let count = |field: &str| usage.get(field).and_then(Value::as_u64).unwrap_or(0);
    let tokens_per_second = value
        .get("timings")
        .and_then(|timings| timings.get("predicted_per_second"))
        .and_then(Value::as_f64)
        .filter(|rate| rate.is_finite() && *rate > 0.0);

    Some(Usage {
        prompt_tokens: count("prompt_tokens"),
        completion_tokens: count("completion_tokens"),
        total_tokens: count("total_tokens"),
        tokens_per_second,
    })
}
