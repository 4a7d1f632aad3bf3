/// Default base URL for a locally hosted inference backend.
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080";

const COMPLETIONS_PATH: &str = "/chat/completions";
const PROXY_CHAT_PATH: &str = "/api/chat";

/// Normalize a base URL to a chat-completions endpoint.
///
/// Normalization rules:
/// 1) keep `/chat/completions` and `/api/chat` endpoints unchanged
/// 2) append `/chat/completions` when path ends in `/v1`
/// 3) append `/v1/chat/completions` otherwise
pub fn normalize_completions_url(input: &str) -> String {
    let base = if input.trim().is_empty() {
        DEFAULT_BASE_URL
    } else {
        input.trim()
    };

    let trimmed = base.trim_end_matches('/');
    if trimmed.ends_with(COMPLETIONS_PATH) || trimmed.ends_with(PROXY_CHAT_PATH) {
        return trimmed.to_string();
    }
    if trimmed.ends_with("/v1") {
        return format!("{trimmed}{COMPLETIONS_PATH}");
    }
    format!("{trimmed}/v1{COMPLETIONS_PATH}")
}
