use chat_types::{Message, Role};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Text used for an image turn when the user typed nothing.
pub const DEFAULT_IMAGE_PROMPT: &str = "Analyze this image";

/// Canonical request payload for a streaming chat-completions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<String>,
    /// Default: true.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default)]
    pub stream_options: StreamOptions,
}

fn default_true() -> bool {
    true
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<WireMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            tools: Vec::new(),
            tool_choice: None,
            stream: true,
            stream_options: StreamOptions::default(),
        }
    }

    /// Build a request from transcript messages in conversational order.
    pub fn from_messages<'a>(
        model: impl Into<String>,
        messages: impl IntoIterator<Item = &'a Message>,
    ) -> Self {
        Self::new(model, messages.into_iter().map(WireMessage::from).collect())
    }

    /// Attach tool definitions; `tool_choice` is `auto` whenever tools are present.
    pub fn with_tools(mut self, tools: Vec<Value>) -> Self {
        self.tool_choice = if tools.is_empty() {
            None
        } else {
            Some("auto".to_string())
        };
        self.tools = tools;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamOptions {
    pub include_usage: bool,
}

impl Default for StreamOptions {
    fn default() -> Self {
        Self {
            include_usage: true,
        }
    }
}

/// One `messages[]` entry on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    pub content: WireContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum WireContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let content = match message.first_image() {
            Some(image) => {
                let text = if message.content.trim().is_empty() {
                    DEFAULT_IMAGE_PROMPT.to_string()
                } else {
                    message.content.clone()
                };
                WireContent::Parts(vec![
                    ContentPart::Text { text },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: image.to_string(),
                        },
                    },
                ])
            }
            None => match message.extra_context.as_deref() {
                Some(extra) if !extra.is_empty() => {
                    WireContent::Text(format!("{}\n{extra}", message.content))
                }
                _ => WireContent::Text(message.content.clone()),
            },
        };

        Self {
            role: message.role,
            content,
        }
    }
}

/// Function tools the local backend knows how to execute.
pub fn default_tools() -> Vec<Value> {
    vec![
        json!({
            "type": "function",
            "function": {
                "name": "get_system_info",
                "description": "Get the local machine's OS and runtime version",
                "parameters": {
                    "type": "object",
                    "properties": {}
                }
            }
        }),
        json!({
            "type": "function",
            "function": {
                "name": "list_local_files",
                "description": "List GGUF files in the downloads folder",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "folder": { "type": "string", "description": "The folder to scan" }
                    }
                }
            }
        }),
    ]
}
