use chat_types::Source;
use serde::{Deserialize, Serialize};

/// Token accounting reported by the backend, usually in the final frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
    /// Server-measured generation rate, when the backend reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_per_second: Option<f64>,
}

impl Usage {
    /// Placeholder frames report zero totals; only positive totals are trusted.
    pub fn is_meaningful(&self) -> bool {
        self.total_tokens > 0
    }
}

/// Out-of-band tool signaling carried by a frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolStatus {
    pub name: Option<String>,
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<Source>,
}

impl ToolStatus {
    pub const THINKING: &'static str = "thinking";
    pub const ERROR: &'static str = "error";

    pub fn is_error(&self) -> bool {
        self.status.eq_ignore_ascii_case(Self::ERROR)
    }
}

/// Semantic event produced by the interpreter, in arrival order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ContentDelta { text: String },
    ToolStatus(ToolStatus),
    Usage(Usage),
    /// Sentinel line or body close.
    Done,
    /// Payload that failed to parse; callers log and skip it.
    Unparseable { payload: String, reason: String },
}

impl StreamEvent {
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }
}
