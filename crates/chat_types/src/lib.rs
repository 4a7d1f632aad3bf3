//! Minimal provider-agnostic contract shared by the transport, the session
//! store and the session controller.
//!
//! This crate intentionally defines only transcript message types and the
//! shared cancellation flag. It excludes transport details, wire payloads and
//! storage concerns.

use std::sync::{atomic::AtomicBool, Arc};

use serde::{Deserialize, Serialize};

/// Shared cancellation flag for one turn.
pub type CancelSignal = Arc<AtomicBool>;

/// Author of a transcript message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Reference surfaced by a tool (for example a web search hit).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub title: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
}

impl Source {
    #[must_use]
    pub fn new(title: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: None,
        }
    }

    #[must_use]
    pub fn with_snippet(mut self, snippet: impl Into<String>) -> Self {
        self.snippet = Some(snippet.into());
        self
    }
}

/// One transcript entry.
///
/// The serialized shape (camelCase, optional fields omitted) is the durable
/// snapshot format, so field names must stay stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub role: Role,
    #[serde(default)]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extra_context: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub used_tool: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_error: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
}

impl Message {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            extra_context: None,
            images: None,
            used_tool: None,
            tool_name: None,
            tool_status: None,
            is_error: None,
            sources: None,
        }
    }

    #[must_use]
    pub fn with_extra_context(mut self, extra_context: impl Into<String>) -> Self {
        self.extra_context = Some(extra_context.into());
        self
    }

    #[must_use]
    pub fn with_images(mut self, images: Vec<String>) -> Self {
        self.images = if images.is_empty() { None } else { Some(images) };
        self
    }

    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    pub fn used_tool(&self) -> bool {
        self.used_tool.unwrap_or(false)
    }

    pub fn first_image(&self) -> Option<&str> {
        self.images
            .as_deref()
            .and_then(|images| images.first())
            .map(String::as_str)
    }

    /// Assistant message that carries neither text nor an error flag.
    pub fn is_empty_placeholder(&self) -> bool {
        self.role == Role::Assistant && self.content.is_empty() && !self.is_error()
    }

    /// Returns true when a failed turn produced no text at all.
    pub fn is_empty_failure(&self) -> bool {
        self.is_error() && self.content.is_empty()
    }

    /// Appends sources, skipping any whose URL is already attached.
    pub fn merge_sources(&mut self, incoming: impl IntoIterator<Item = Source>) {
        let sources = self.sources.get_or_insert_with(Vec::new);
        for source in incoming {
            if !sources.iter().any(|existing| existing.url == source.url) {
                sources.push(source);
            }
        }
        if sources.is_empty() {
            self.sources = None;
        }
    }
}
