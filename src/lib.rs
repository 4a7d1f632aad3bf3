//! Streaming chat session controller for local inference endpoints.
//!
//! # Public API Overview
//! - Drive turns with [`SessionController::submit`], stop them with a
//!   [`CancelHandle`] and observe progress through [`SessionObserver`].
//! - Stage uploaded documents and images with [`Attachment`].
//! - Read live throughput from [`Metrics`].
//! - Load settings with [`ChatConfig::from_env`].
//!
//! Transport and persistence live in the `inference_api` and
//! `session_store` crates; this crate only owns turn state.

pub mod attachment;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod metrics;
pub mod transcript;

pub use crate::attachment::{Attachment, UserInput, DEFAULT_PDF_NAME};
pub use crate::config::ChatConfig;
pub use crate::controller::{
    CancelHandle, Session, SessionController, SessionObserver, TurnOutcome, TurnSettings,
    TurnState,
};
pub use crate::error::SessionError;
pub use crate::metrics::{Metrics, MetricsAggregator};
pub use crate::transcript::Transcript;
