//! Client configuration: JSON file plus environment overrides.

use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use inference_api::InferenceApiConfig;
use serde::Deserialize;

use crate::error::SessionError;

pub const CONFIG_PATH_ENV: &str = "CHAT_STREAM_CONFIG_PATH";
pub const BASE_URL_ENV: &str = "CHAT_STREAM_BASE_URL";
pub const MODEL_ENV: &str = "CHAT_STREAM_MODEL";

pub const DEFAULT_MODEL: &str = "Qwen3VL-2B-Instruct-Q4_K_M.gguf";
pub const DEFAULT_CONTEXT_LIMIT: u64 = 8192;
pub const DEFAULT_STORE_DIR: &str = ".chat_stream/sessions";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChatConfig {
    pub base_url: String,
    pub model: String,
    pub timeout_sec: Option<u64>,
    pub max_retries: u32,
    pub enable_tools: bool,
    /// Model context window, used to report how full the conversation is.
    pub context_limit: u64,
    pub store_dir: PathBuf,
    pub headers: BTreeMap<String, String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: inference_api::url::DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout_sec: None,
            max_retries: inference_api::retry::MAX_RETRIES,
            enable_tools: true,
            context_limit: DEFAULT_CONTEXT_LIMIT,
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            headers: BTreeMap::new(),
        }
    }
}

impl ChatConfig {
    /// Defaults, then the file named by `CHAT_STREAM_CONFIG_PATH`, then the
    /// individual env overrides.
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = match env_string_opt(CONFIG_PATH_ENV) {
            Some(path) => Self::from_file(PathBuf::from(path))?,
            None => Self::default(),
        };

        if let Some(base_url) = env_string_opt(BASE_URL_ENV) {
            config.base_url = base_url;
        }
        if let Some(model) = env_string_opt(MODEL_ENV) {
            config.model = model;
        }

        config.validate(None)?;
        Ok(config)
    }

    pub fn from_file(path: PathBuf) -> Result<Self, SessionError> {
        let raw = fs::read_to_string(&path)
            .map_err(|error| SessionError::config(Some(path.clone()), error.to_string()))?;
        let config: Self = serde_json::from_str(&raw)
            .map_err(|error| SessionError::config(Some(path.clone()), error.to_string()))?;
        config.validate(Some(path))?;
        Ok(config)
    }

    fn validate(&self, path: Option<PathBuf>) -> Result<(), SessionError> {
        if self.timeout_sec == Some(0) {
            return Err(SessionError::config(path, "timeout_sec must be greater than 0"));
        }
        if self.model.trim().is_empty() {
            return Err(SessionError::config(path, "model must not be empty"));
        }
        if self.context_limit == 0 {
            return Err(SessionError::config(path, "context_limit must be greater than 0"));
        }
        Ok(())
    }

    /// Transport settings derived from this config.
    pub fn api_config(&self) -> InferenceApiConfig {
        let mut api = InferenceApiConfig::new(self.base_url.clone())
            .with_max_retries(self.max_retries)
            .with_headers(self.headers.clone());
        if let Some(seconds) = self.timeout_sec {
            api = api.with_timeout(Duration::from_secs(seconds));
        }
        api
    }
}

fn env_string_opt(key: &str) -> Option<String> {
    env::var(key).ok().and_then(|value| {
        if value.trim().is_empty() {
            None
        } else {
            Some(value)
        }
    })
}
