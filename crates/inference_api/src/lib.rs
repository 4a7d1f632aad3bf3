//! Transport-only client primitives for a streaming chat-completions endpoint.
//!
//! This crate owns request building, the event-stream frame decoder and the
//! payload interpreter. It intentionally contains no transcript state and no
//! persistence; those belong to the session controller.
//!
//! Decoding is split in two stages:
//!
//! - [`FrameDecoder`] turns arbitrarily chunked bytes into payload strings and
//!   detects the `[DONE]` sentinel.
//! - [`interpret_payload`] maps one payload into zero or more [`StreamEvent`]s.
//!
//! [`EventStreamDecoder`] chains both for callers that only want events.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod interpret;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::{await_or_cancel, is_cancelled, ChunkStream, CompletionTransport, InferenceClient};
pub use config::InferenceApiConfig;
pub use error::InferenceApiError;
pub use events::{StreamEvent, ToolStatus, Usage};
pub use interpret::interpret_payload;
pub use payload::{ChatRequest, WireMessage};
pub use sse::{DecodedBatch, EventStreamDecoder, FrameBatch, FrameDecoder, DONE_SENTINEL};
pub use url::normalize_completions_url;

pub use reqwest::StatusCode;
