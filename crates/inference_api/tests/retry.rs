use std::time::Duration;

use inference_api::retry::{is_transient_status, RetryPolicy, MAX_RETRIES};
use inference_api::StatusCode;

#[test]
fn model_still_loading_is_retried() {
    let body = r#"{"error":{"code":503,"message":"Loading model","type":"unavailable_error"}}"#;
    assert!(is_transient_status(StatusCode::SERVICE_UNAVAILABLE, body));
}

#[test]
fn context_overflow_is_never_retried() {
    let body = r#"{"error":{"code":400,"message":"the request exceeds the available context size","type":"exceed_context_size_error","n_prompt_tokens":9000,"n_ctx":8192}}"#;
    assert!(!is_transient_status(StatusCode::BAD_REQUEST, body));
}

#[test]
fn server_error_without_a_transient_hint_is_final() {
    let body = r#"{"error":{"code":500,"message":"Failed to parse tools","type":"server_error"}}"#;
    assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR, body));
    assert!(!is_transient_status(StatusCode::INTERNAL_SERVER_ERROR, ""));
}

#[test]
fn gateway_statuses_are_retried_whatever_the_body() {
    for status in [
        StatusCode::TOO_MANY_REQUESTS,
        StatusCode::BAD_GATEWAY,
        StatusCode::SERVICE_UNAVAILABLE,
        StatusCode::GATEWAY_TIMEOUT,
    ] {
        assert!(is_transient_status(status, "<html>upstream</html>"), "{status}");
    }
}

#[test]
fn untyped_busy_messages_are_retried() {
    assert!(is_transient_status(
        StatusCode::INTERNAL_SERVER_ERROR,
        r#"{"error":"no slot available, try again"}"#
    ));
    assert!(is_transient_status(StatusCode::BAD_REQUEST, "Rate limit reached"));
    assert!(!is_transient_status(StatusCode::NOT_FOUND, r#"{"error":{"message":"unknown model"}}"#));
}

#[test]
fn default_policy_allows_two_retries_with_doubling_backoff() {
    let policy = RetryPolicy::default();
    assert_eq!(policy.max_retries, MAX_RETRIES);
    assert!(policy.has_budget_after(1));
    assert!(!policy.has_budget_after(2));
    assert_eq!(
        (0..3).map(|attempt| policy.backoff(attempt)).collect::<Vec<_>>(),
        vec![
            Duration::from_millis(500),
            Duration::from_secs(1),
            Duration::from_secs(2)
        ]
    );
}

#[test]
fn zero_retry_policy_never_waits() {
    assert!(!RetryPolicy::new(0).has_budget_after(0));
}
