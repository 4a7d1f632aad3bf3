use std::future::Future;
use std::sync::atomic::Ordering;
use std::time::Duration;

use chat_types::CancelSignal;
use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use tracing::{debug, warn};

use crate::config::InferenceApiConfig;
use crate::error::{parse_error_message, InferenceApiError};
use crate::headers::build_headers;
use crate::payload::ChatRequest;
use crate::retry::{is_transient_request_error, is_transient_status, RetryPolicy};
use crate::url::normalize_completions_url;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Raw response body chunks in arrival order.
pub type ChunkStream = BoxStream<'static, Result<Vec<u8>, InferenceApiError>>;

/// Seam between a turn driver and the HTTP transport.
///
/// Implementations issue the request and hand back the open body; they never
/// decode frames and never retry once the body is open.
pub trait CompletionTransport: Send + Sync {
    fn open_stream<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<ChunkStream, InferenceApiError>>;
}

#[derive(Debug)]
pub struct InferenceClient {
    http: Client,
    config: InferenceApiConfig,
}

impl InferenceClient {
    pub fn new(config: InferenceApiConfig) -> Result<Self, InferenceApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(InferenceApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &InferenceApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_completions_url(&self.config.base_url)
    }

    pub fn build_headers(&self, user_agent: Option<&str>) -> Result<HeaderMap, InferenceApiError> {
        let headers = build_headers(&self.config, user_agent);
        let mut out = HeaderMap::new();
        for (key, value) in headers {
            out.insert(
                HeaderName::from_bytes(key.as_bytes()).map_err(|_| {
                    InferenceApiError::InvalidHeader(format!("invalid header key: {key}"))
                })?,
                HeaderValue::from_str(&value).map_err(|_| {
                    InferenceApiError::InvalidHeader(format!("invalid header value for {key}"))
                })?,
            );
        }
        Ok(out)
    }

    pub fn build_request(
        &self,
        request: &ChatRequest,
    ) -> Result<reqwest::RequestBuilder, InferenceApiError> {
        let endpoint = reqwest::Url::parse(&self.normalized_endpoint())
            .map_err(|error| InferenceApiError::InvalidBaseUrl(error.to_string()))?;
        let headers = self.build_headers(self.config.user_agent.as_deref())?;
        let mut payload = request.clone();
        payload.stream = true;
        payload.stream_options.include_usage = true;

        Ok(self.http.post(endpoint).headers(headers).json(&payload))
    }

    /// Send the request, retrying transient failures until a 2xx arrives.
    pub async fn send_with_retry(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
    ) -> Result<Response, InferenceApiError> {
        let policy = RetryPolicy::new(self.config.max_retries);
        let mut last_status: Option<StatusCode> = None;
        let mut last_error = None;

        for attempt in 0..=policy.max_retries {
            if is_cancelled(cancellation) {
                return Err(InferenceApiError::Cancelled);
            }

            let response = self.build_request(request)?.send();
            let response = await_or_cancel(response, cancellation).await?;

            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        debug!(%status, attempt, "completion stream opened");
                        return Ok(response);
                    }

                    last_status = Some(status);
                    let body = await_or_cancel(response.text(), cancellation)
                        .await?
                        .unwrap_or_default();
                    let message = parse_error_message(status, &body);
                    last_error = Some(message.clone());

                    if policy.has_budget_after(attempt) && is_transient_status(status, &body) {
                        warn!(%status, attempt, %message, "retrying completion request");
                        await_or_cancel(tokio::time::sleep(policy.backoff(attempt)), cancellation)
                            .await?;
                        continue;
                    }

                    return Err(InferenceApiError::Status(status, message));
                }
                Err(error) if !is_transient_request_error(&error) => {
                    return Err(InferenceApiError::Request(error));
                }
                Err(error) => {
                    let message = error.to_string();
                    last_error = Some(message.clone());
                    if policy.has_budget_after(attempt) {
                        warn!(attempt, %message, "retrying completion request");
                        await_or_cancel(tokio::time::sleep(policy.backoff(attempt)), cancellation)
                            .await?;
                        continue;
                    }
                    return Err(InferenceApiError::RetryExhausted {
                        status: last_status,
                        last_error,
                    });
                }
            }
        }

        Err(InferenceApiError::RetryExhausted {
            status: last_status,
            last_error,
        })
    }

    /// Open the response body as a chunk stream.
    pub async fn open(
        &self,
        request: &ChatRequest,
        cancellation: Option<&CancelSignal>,
    ) -> Result<ChunkStream, InferenceApiError> {
        let response = self.send_with_retry(request, cancellation).await?;
        Ok(response
            .bytes_stream()
            .map(|chunk| {
                chunk
                    .map(|bytes| bytes.to_vec())
                    .map_err(|error| InferenceApiError::Stream(error.to_string()))
            })
            .boxed())
    }
}

impl CompletionTransport for InferenceClient {
    fn open_stream<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<ChunkStream, InferenceApiError>> {
        Box::pin(self.open(request, Some(cancel)))
    }
}

pub fn is_cancelled(cancel: Option<&CancelSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

/// Race a future against the cancellation flag.
///
/// The flag is polled every 25ms, so an in-flight read is abandoned shortly
/// after cancellation even when the peer stays silent.
pub async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancelSignal>,
) -> Result<F::Output, InferenceApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(InferenceApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(InferenceApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
