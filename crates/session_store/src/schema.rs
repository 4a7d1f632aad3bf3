use chat_types::{Message, Role};
use serde::{Deserialize, Serialize};

const TITLE_MAX_CHARS: usize = 20;
const UNTITLED: &str = "Untitled Chat";

/// Durable state of one conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSnapshot {
    pub messages: Vec<Message>,
    #[serde(default)]
    pub context_usage: u64,
}

impl ChatSnapshot {
    #[must_use]
    pub fn new(messages: Vec<Message>, context_usage: u64) -> Self {
        Self {
            messages,
            context_usage,
        }
    }

    /// Title derived from the first user message.
    #[must_use]
    pub fn title(&self) -> String {
        let Some(first) = self
            .messages
            .iter()
            .find(|message| message.role == Role::User)
            .map(|message| message.content.trim())
            .filter(|content| !content.is_empty())
        else {
            return UNTITLED.to_string();
        };

        if first.chars().count() <= TITLE_MAX_CHARS {
            return first.to_string();
        }
        let head: String = first.chars().take(TITLE_MAX_CHARS).collect();
        format!("{}...", head.trim_end())
    }
}

/// Every shape a snapshot has been stored in.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredSnapshot {
    Current(ChatSnapshot),
    /// Early versions stored a bare message list without usage.
    Legacy(Vec<Message>),
}

impl From<StoredSnapshot> for ChatSnapshot {
    fn from(stored: StoredSnapshot) -> Self {
        match stored {
            StoredSnapshot::Current(snapshot) => snapshot,
            StoredSnapshot::Legacy(messages) => Self::new(messages, 0),
        }
    }
}

/// Chat history entry for listing stored sessions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub message_count: usize,
    pub context_usage: u64,
}
