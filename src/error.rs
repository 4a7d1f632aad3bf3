use std::path::PathBuf;

use inference_api::InferenceApiError;
use session_store::SessionStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a turn is already in progress")]
    Busy,

    #[error("message is empty and has no attachment")]
    EmptyInput,

    #[error("unsupported upload result type '{kind}'")]
    UnsupportedUpload { kind: String },

    #[error("invalid upload result: {0}")]
    InvalidUpload(String),

    #[error(transparent)]
    Transport(#[from] InferenceApiError),

    #[error(transparent)]
    Store(#[from] SessionStoreError),

    #[error("no stored session with id '{id}'")]
    SessionNotFound { id: String },

    #[error("invalid configuration in {}: {message}", config_origin(.path))]
    Config {
        path: Option<PathBuf>,
        message: String,
    },
}

impl SessionError {
    pub fn config(path: Option<PathBuf>, message: impl Into<String>) -> Self {
        Self::Config {
            path,
            message: message.into(),
        }
    }

    /// Failures the user should see as a failed turn.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

fn config_origin(path: &Option<PathBuf>) -> String {
    match path {
        Some(path) => path.display().to_string(),
        None => "environment".to_string(),
    }
}
