//! One conversational turn at a time over a streaming completion transport.
//!
//! A turn moves `Idle -> Sending -> Streaming -> {Completed | Cancelled | Errored}`
//! and always settles back in `Idle`. Every transcript mutation is applied in
//! arrival order between suspension points, then persisted and broadcast to
//! observers. Once the turn's cancel signal is set nothing from that turn
//! touches the transcript or the store again.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use chat_types::CancelSignal;
use futures_util::StreamExt;
use inference_api::payload::default_tools;
use inference_api::{
    await_or_cancel, is_cancelled, ChatRequest, CompletionTransport, EventStreamDecoder,
    InferenceApiError, InferenceClient, StreamEvent,
};
use session_store::{
    new_session_id, normalize_session_id, ChatSnapshot, FileStore, SessionStore, SessionSummary,
};
use tracing::{debug, info, warn};

use crate::attachment::UserInput;
use crate::config::ChatConfig;
use crate::error::SessionError;
use crate::metrics::{Metrics, MetricsAggregator};
use crate::transcript::Transcript;

/// Identity and cumulative usage of the conversation being driven.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    /// Assigned on the first turn of a new conversation.
    pub id: Option<String>,
    pub context_usage: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Sending,
    Streaming,
    Completed,
    Cancelled,
    Errored,
}

impl TurnState {
    pub fn is_active(self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TurnOutcome {
    Completed { metrics: Metrics },
    Cancelled,
}

/// Progress callbacks. All methods default to no-ops.
pub trait SessionObserver: Send {
    fn on_transcript(&mut self, _transcript: &Transcript) {}

    fn on_metrics(&mut self, _metrics: &Metrics) {}

    fn on_state(&mut self, _state: TurnState) {}
}

/// Requests cancellation of whichever turn is in flight.
///
/// Clones share the same slot, so a handle taken before a turn starts still
/// reaches it. Cancelling while idle does nothing.
#[derive(Debug, Clone, Default)]
pub struct CancelHandle {
    active: Arc<Mutex<Option<CancelSignal>>>,
}

impl CancelHandle {
    /// Returns true when a turn was in flight.
    pub fn cancel(&self) -> bool {
        match lock_unpoisoned(&self.active).as_ref() {
            Some(signal) => {
                signal.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub fn is_active(&self) -> bool {
        lock_unpoisoned(&self.active).is_some()
    }

    fn arm(&self) -> CancelSignal {
        let signal: CancelSignal = Arc::new(AtomicBool::new(false));
        *lock_unpoisoned(&self.active) = Some(Arc::clone(&signal));
        signal
    }

    fn disarm(&self) {
        *lock_unpoisoned(&self.active) = None;
    }
}

/// Per-request settings that do not change between turns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnSettings {
    pub model: String,
    pub enable_tools: bool,
}

impl From<&ChatConfig> for TurnSettings {
    fn from(config: &ChatConfig) -> Self {
        Self {
            model: config.model.clone(),
            enable_tools: config.enable_tools,
        }
    }
}

enum StreamEnd {
    Completed,
    Cancelled,
}

pub struct SessionController {
    transport: Box<dyn CompletionTransport>,
    store: SessionStore,
    settings: TurnSettings,
    transcript: Transcript,
    session: Session,
    metrics: Metrics,
    state: TurnState,
    cancel: CancelHandle,
    observers: Vec<Box<dyn SessionObserver>>,
}

impl SessionController {
    pub fn new(
        transport: impl CompletionTransport + 'static,
        store: SessionStore,
        settings: TurnSettings,
    ) -> Self {
        Self {
            transport: Box::new(transport),
            store,
            settings,
            transcript: Transcript::new(),
            session: Session::default(),
            metrics: Metrics::default(),
            state: TurnState::Idle,
            cancel: CancelHandle::default(),
            observers: Vec::new(),
        }
    }

    /// HTTP transport and file-backed store as described by `config`.
    pub fn from_config(config: &ChatConfig) -> Result<Self, SessionError> {
        let client = InferenceClient::new(config.api_config())?;
        let store = SessionStore::new(FileStore::open(&config.store_dir)?);
        Ok(Self::new(client, store, TurnSettings::from(config)))
    }

    pub fn subscribe(&mut self, observer: Box<dyn SessionObserver>) {
        self.observers.push(observer);
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn metrics(&self) -> Metrics {
        self.metrics
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn settings(&self) -> &TurnSettings {
        &self.settings
    }

    /// Run one turn to completion, cancellation or failure.
    ///
    /// A transport failure is returned once, after the reply has been
    /// flagged as failed and persisted.
    pub async fn submit(&mut self, input: UserInput) -> Result<TurnOutcome, SessionError> {
        self.ensure_idle()?;
        if input.is_empty() {
            return Err(SessionError::EmptyInput);
        }

        self.transcript.prune_empty_placeholders();
        if self.session.id.is_none() && self.transcript.is_empty() {
            let id = new_session_id();
            info!(session_id = %id, "starting new session");
            self.session.id = Some(id);
        }

        self.transcript.push_user(input.into_message());
        let request = self.build_request();
        self.transcript.open_assistant_turn();

        let signal = self.cancel.arm();
        let mut aggregator = MetricsAggregator::start(Instant::now(), self.session.context_usage);
        self.set_state(TurnState::Sending);
        self.set_metrics(aggregator.metrics());
        self.commit();

        debug!(
            messages = request.messages.len(),
            tools = request.tools.len(),
            "turn request built"
        );
        let result = self.stream_turn(&request, &signal, &mut aggregator).await;
        self.cancel.disarm();

        let cancelled = is_cancelled(Some(&signal));
        match result {
            Ok(StreamEnd::Cancelled) => self.finish_cancelled(),
            Err(_) if cancelled => self.finish_cancelled(),
            Err(error) if error.is_cancelled() => self.finish_cancelled(),
            Ok(StreamEnd::Completed) => {
                self.transcript.close_turn();
                if self.transcript.prune_empty_placeholders() > 0 {
                    self.notify_transcript();
                }
                self.persist();
                self.set_state(TurnState::Completed);
                self.set_state(TurnState::Idle);
                info!(
                    total_tokens = self.metrics.total_tokens,
                    tokens_per_second = self.metrics.tokens_per_second,
                    "turn completed"
                );
                Ok(TurnOutcome::Completed {
                    metrics: self.metrics,
                })
            }
            Err(error) => {
                warn!(error = %error, "turn failed");
                self.transcript.mark_error();
                self.transcript.close_turn();
                self.commit();
                self.set_state(TurnState::Errored);
                self.set_state(TurnState::Idle);
                Err(SessionError::Transport(error))
            }
        }
    }

    /// Forget the current conversation and start over.
    pub fn new_chat(&mut self) -> Result<(), SessionError> {
        self.ensure_idle()?;
        self.transcript.clear();
        self.session = Session::default();
        self.set_metrics(Metrics::default());
        self.notify_transcript();
        info!("started new chat");
        Ok(())
    }

    /// Load a stored conversation and continue it.
    pub fn resume(&mut self, id: &str) -> Result<(), SessionError> {
        self.ensure_idle()?;
        let id = normalize_session_id(id)?;
        let snapshot = self
            .store
            .read(&id)?
            .ok_or_else(|| SessionError::SessionNotFound { id: id.clone() })?;

        self.transcript = Transcript::from_messages(snapshot.messages);
        self.session = Session {
            id: Some(id),
            context_usage: snapshot.context_usage,
        };
        self.set_metrics(Metrics {
            total_tokens: snapshot.context_usage,
            ..Metrics::default()
        });
        self.notify_transcript();
        info!(
            session_id = self.session.id.as_deref().unwrap_or_default(),
            messages = self.transcript.len(),
            "resumed session"
        );
        Ok(())
    }

    /// Stored conversations, newest first.
    pub fn sessions(&self) -> Result<Vec<SessionSummary>, SessionError> {
        Ok(self.store.list()?)
    }

    /// Delete a stored conversation; deleting the current one starts a new chat.
    pub fn delete_session(&mut self, id: &str) -> Result<bool, SessionError> {
        self.ensure_idle()?;
        let id = normalize_session_id(id)?;
        let removed = self.store.delete(&id)?;
        if self.session.id.as_deref() == Some(id.as_str()) {
            self.new_chat()?;
        }
        Ok(removed)
    }

    /// Recover after a `submit` future was dropped before it settled.
    ///
    /// The partial reply is kept and the controller returns to `Idle`.
    pub fn abandon_turn(&mut self) {
        if !self.state.is_active() {
            return;
        }
        self.cancel.cancel();
        self.cancel.disarm();
        self.transcript.close_turn();
        self.transcript.prune_empty_placeholders();
        self.set_state(TurnState::Cancelled);
        self.set_state(TurnState::Idle);
    }

    async fn stream_turn(
        &mut self,
        request: &ChatRequest,
        signal: &CancelSignal,
        aggregator: &mut MetricsAggregator,
    ) -> Result<StreamEnd, InferenceApiError> {
        let mut chunks =
            await_or_cancel(self.transport.open_stream(request, signal), Some(signal)).await??;
        let mut decoder = EventStreamDecoder::default();

        loop {
            let next = await_or_cancel(chunks.next(), Some(signal)).await?;
            if is_cancelled(Some(signal)) {
                return Ok(StreamEnd::Cancelled);
            }

            let (batch, closed) = match next {
                Some(chunk) => {
                    let bytes = chunk?;
                    if self.state == TurnState::Sending {
                        self.set_state(TurnState::Streaming);
                    }
                    (decoder.feed(&bytes), false)
                }
                None => (decoder.finish(), true),
            };

            for event in batch.events {
                if is_cancelled(Some(signal)) {
                    return Ok(StreamEnd::Cancelled);
                }
                if event.is_done() {
                    return Ok(StreamEnd::Completed);
                }
                self.apply_event(event, aggregator);
            }

            if batch.done || closed {
                return Ok(StreamEnd::Completed);
            }
        }
    }

    fn apply_event(&mut self, event: StreamEvent, aggregator: &mut MetricsAggregator) {
        match event {
            StreamEvent::ContentDelta { text } => {
                if self.transcript.append_delta(&text) {
                    self.set_metrics(aggregator.record_delta(Instant::now()));
                    self.commit();
                }
            }
            StreamEvent::ToolStatus(status) => {
                debug!(tool = ?status.name, status = %status.status, "tool status");
                if self.transcript.apply_tool_status(&status) {
                    self.commit();
                }
            }
            StreamEvent::Usage(usage) => {
                let meaningful = aggregator.record_usage(&usage, Instant::now());
                self.set_metrics(aggregator.metrics());
                if meaningful {
                    self.session.context_usage = self.metrics.total_tokens;
                    self.persist();
                }
            }
            StreamEvent::Unparseable { payload, reason } => {
                debug!(%reason, payload_len = payload.len(), "skipping malformed frame");
            }
            StreamEvent::Done => {}
        }
    }

    fn finish_cancelled(&mut self) -> Result<TurnOutcome, SessionError> {
        self.transcript.close_turn();
        self.set_state(TurnState::Cancelled);
        self.set_state(TurnState::Idle);
        info!("turn cancelled");
        Ok(TurnOutcome::Cancelled)
    }

    fn ensure_idle(&self) -> Result<(), SessionError> {
        if self.state.is_active() || self.cancel.is_active() {
            return Err(SessionError::Busy);
        }
        Ok(())
    }

    fn build_request(&self) -> ChatRequest {
        let request =
            ChatRequest::from_messages(self.settings.model.clone(), self.transcript.request_messages());
        if self.settings.enable_tools {
            request.with_tools(default_tools())
        } else {
            request
        }
    }

    fn commit(&mut self) {
        self.persist();
        self.notify_transcript();
    }

    fn persist(&mut self) {
        let Some(id) = self.session.id.as_deref() else {
            return;
        };
        let snapshot = ChatSnapshot::new(
            self.transcript.messages().to_vec(),
            self.session.context_usage,
        );
        if let Err(error) = self.store.write(id, &snapshot) {
            warn!(session_id = %id, error = %error, "failed to persist session snapshot");
        }
    }

    fn notify_transcript(&mut self) {
        for observer in &mut self.observers {
            observer.on_transcript(&self.transcript);
        }
    }

    fn set_metrics(&mut self, metrics: Metrics) {
        self.metrics = metrics;
        for observer in &mut self.observers {
            observer.on_metrics(&self.metrics);
        }
    }

    fn set_state(&mut self, state: TurnState) {
        self.state = state;
        for observer in &mut self.observers {
            observer.on_state(state);
        }
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("session", &self.session)
            .field("state", &self.state)
            .field("messages", &self.transcript.len())
            .finish_non_exhaustive()
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
