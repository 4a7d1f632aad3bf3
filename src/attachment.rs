//! Intake of the upload/convert service's normalized result.

use chat_types::Message;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SessionError;

/// Name used for a pdf result that does not carry one.
pub const DEFAULT_PDF_NAME: &str = "document.pdf";

/// Non-text context staged for the next user message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    Pdf { name: String, text: String },
    Image { base64: String },
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum UploadResult {
    Pdf {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        text: Option<String>,
    },
    Image {
        base64: String,
    },
}

impl Attachment {
    /// Parse the upload service response body.
    ///
    /// An unknown or missing `type` is [`SessionError::UnsupportedUpload`].
    /// A pdf without `name` falls back to [`DEFAULT_PDF_NAME`] and one without
    /// `text` carries empty text. An image without `base64` or a body that is
    /// not JSON is [`SessionError::InvalidUpload`].
    pub fn from_upload_result(body: &str) -> Result<Self, SessionError> {
        Self::from_upload_result_named(body, DEFAULT_PDF_NAME)
    }

    /// Like [`Attachment::from_upload_result`], naming an unnamed pdf after
    /// the file that was uploaded.
    pub fn from_upload_result_named(body: &str, uploaded_name: &str) -> Result<Self, SessionError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|error| SessionError::InvalidUpload(error.to_string()))?;
        Self::from_upload_value(value, uploaded_name)
    }

    pub fn from_upload_value(value: Value, uploaded_name: &str) -> Result<Self, SessionError> {
        let kind = match value.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(other) => other.to_string(),
            None => "<missing>".to_string(),
        };
        if kind != "pdf" && kind != "image" {
            return Err(SessionError::UnsupportedUpload { kind });
        }

        let parsed: UploadResult = serde_json::from_value(value)
            .map_err(|error| SessionError::InvalidUpload(error.to_string()))?;
        Ok(match parsed {
            UploadResult::Pdf { name, text } => Self::Pdf {
                name: name
                    .filter(|name| !name.trim().is_empty())
                    .unwrap_or_else(|| uploaded_name.to_owned()),
                text: text.unwrap_or_default(),
            },
            UploadResult::Image { base64 } => Self::Image { base64 },
        })
    }

    fn apply(self, message: Message) -> Message {
        match self {
            Self::Pdf { name, text } => message.with_extra_context(format!(
                "Uploaded PDF: {name}\n\nDocument content:\n{text}"
            )),
            Self::Image { base64 } => message.with_images(vec![base64]),
        }
    }
}

/// What the caller submits for one turn.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UserInput {
    pub text: String,
    pub attachment: Option<Attachment>,
}

impl UserInput {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            attachment: None,
        }
    }

    #[must_use]
    pub fn with_attachment(mut self, attachment: Attachment) -> Self {
        self.attachment = Some(attachment);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachment.is_none()
    }

    /// The transcript entry this input becomes.
    pub fn into_message(self) -> Message {
        let message = Message::user(self.text);
        match self.attachment {
            Some(attachment) => attachment.apply(message),
            None => message,
        }
    }
}

impl From<&str> for UserInput {
    fn from(text: &str) -> Self {
        Self::text(text)
    }
}
