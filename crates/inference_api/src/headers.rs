use std::collections::BTreeMap;

use crate::config::InferenceApiConfig;

pub const HEADER_ACCEPT: &str = "accept";
pub const HEADER_CONTENT_TYPE: &str = "content-type";
pub const HEADER_USER_AGENT: &str = "user-agent";

/// Build a deterministic header map for streaming completion requests.
///
/// Extra headers are applied last and may override the defaults.
pub fn build_headers(
    config: &InferenceApiConfig,
    user_agent: Option<&str>,
) -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();

    headers.insert(HEADER_ACCEPT.to_owned(), "text/event-stream".to_owned());
    headers.insert(
        HEADER_CONTENT_TYPE.to_owned(),
        "application/json".to_owned(),
    );

    let ua = match (user_agent, config.user_agent.as_deref()) {
        (Some(explicit), _) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        (_, Some(explicit)) if !explicit.trim().is_empty() => explicit.trim().to_owned(),
        _ => default_user_agent(),
    };
    headers.insert(HEADER_USER_AGENT.to_owned(), ua);

    for (key, value) in &config.extra_headers {
        let key = key.trim().to_ascii_lowercase();
        if !key.is_empty() {
            headers.insert(key, value.trim().to_owned());
        }
    }

    headers
}

fn default_user_agent() -> String {
    format!(
        "inference_api/{} ({}; {})",
        env!("CARGO_PKG_VERSION"),
        std::env::consts::OS,
        normalize_arch(std::env::consts::ARCH)
    )
}

fn normalize_arch(arch: &str) -> String {
    match arch.to_ascii_lowercase().as_str() {
        "x86_64" | "amd64" => "x64".to_owned(),
        "x86" | "i386" | "i686" => "ia32".to_owned(),
        "aarch64" => "arm64".to_owned(),
        normalized => normalized.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::{build_headers, HEADER_ACCEPT, HEADER_USER_AGENT};
    use crate::config::InferenceApiConfig;

    #[test]
    fn headers_request_event_stream() {
        let headers = build_headers(&InferenceApiConfig::default(), None);
        assert_eq!(
            headers.get(HEADER_ACCEPT).map(String::as_str),
            Some("text/event-stream")
        );
        assert!(headers
            .get(HEADER_USER_AGENT)
            .is_some_and(|ua| ua.starts_with("inference_api/")));
    }

    #[test]
    fn explicit_user_agent_wins_over_config() {
        let config = InferenceApiConfig::default().with_user_agent("from-config");
        let headers = build_headers(&config, Some("explicit"));
        assert_eq!(
            headers.get(HEADER_USER_AGENT).map(String::as_str),
            Some("explicit")
        );

        let headers = build_headers(&config, None);
        assert_eq!(
            headers.get(HEADER_USER_AGENT).map(String::as_str),
            Some("from-config")
        );
    }

    #[test]
    fn extra_headers_are_lowercased_and_trimmed() {
        let config = InferenceApiConfig::default().insert_header(" X-Trace ", " abc ");
        let headers = build_headers(&config, None);
        assert_eq!(headers.get("x-trace").map(String::as_str), Some("abc"));
    }
}
