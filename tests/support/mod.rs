#![allow(dead_code)]

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, MutexGuard};

use chat_stream::{
    CancelHandle, Metrics, SessionController, SessionObserver, Transcript, TurnSettings, TurnState,
};
use chat_types::{CancelSignal, Message};
use futures_util::future::BoxFuture;
use futures_util::{future, stream, FutureExt, StreamExt};
use inference_api::{ChatRequest, ChunkStream, CompletionTransport, InferenceApiError};
use serde_json::{json, Value};
use session_store::{KeyValueStore, MemoryStore, SessionStore, SessionStoreError};

pub const MODEL: &str = "test-model.gguf";

/// One body step delivered by the scripted transport.
pub enum Step {
    Chunk(Vec<u8>),
    Fail(String),
    /// Cancel the turn through the controller's handle, as a user would.
    Cancel,
}

pub enum Script {
    Open(Vec<Step>),
    Refuse(InferenceApiError),
    /// Never resolves.
    Hang,
}

#[derive(Default)]
pub struct TransportTrace {
    pub scripts: VecDeque<Script>,
    pub requests: Vec<ChatRequest>,
    pub cancel_handle: Option<CancelHandle>,
}

#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<TransportTrace>>,
}

impl ScriptedTransport {
    pub fn new(scripts: Vec<Script>) -> (Self, Arc<Mutex<TransportTrace>>) {
        let state = Arc::new(Mutex::new(TransportTrace {
            scripts: scripts.into(),
            ..TransportTrace::default()
        }));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl CompletionTransport for ScriptedTransport {
    fn open_stream<'a>(
        &'a self,
        request: &'a ChatRequest,
        cancel: &'a CancelSignal,
    ) -> BoxFuture<'a, Result<ChunkStream, InferenceApiError>> {
        let mut state = lock_unpoisoned(&self.state);
        state.requests.push(request.clone());
        let script = state
            .scripts
            .pop_front()
            .unwrap_or_else(|| Script::Open(vec![Step::Chunk(done())]));
        let handle = state.cancel_handle.clone();
        let signal = Arc::clone(cancel);
        drop(state);

        match script {
            Script::Refuse(error) => future::ready(Err(error)).boxed(),
            Script::Hang => future::pending::<Result<ChunkStream, InferenceApiError>>().boxed(),
            Script::Open(steps) => {
                let body = stream::iter(steps).filter_map(move |step| {
                    let item = match step {
                        Step::Chunk(bytes) => Some(Ok(bytes)),
                        Step::Fail(message) => Some(Err(InferenceApiError::Stream(message))),
                        Step::Cancel => {
                            match &handle {
                                Some(handle) => {
                                    handle.cancel();
                                }
                                None => signal.store(true, Ordering::Release),
                            }
                            None
                        }
                    };
                    future::ready(item)
                });
                future::ready(Ok(body.boxed())).boxed()
            }
        }
    }
}

#[derive(Default)]
pub struct ObserverTrace {
    pub transcripts: Vec<Vec<Message>>,
    pub metrics: Vec<Metrics>,
    pub states: Vec<TurnState>,
}

pub struct RecordingObserver {
    state: Arc<Mutex<ObserverTrace>>,
}

impl RecordingObserver {
    pub fn new() -> (Self, Arc<Mutex<ObserverTrace>>) {
        let state = Arc::new(Mutex::new(ObserverTrace::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            state,
        )
    }
}

impl SessionObserver for RecordingObserver {
    fn on_transcript(&mut self, transcript: &Transcript) {
        lock_unpoisoned(&self.state)
            .transcripts
            .push(transcript.messages().to_vec());
    }

    fn on_metrics(&mut self, metrics: &Metrics) {
        lock_unpoisoned(&self.state).metrics.push(*metrics);
    }

    fn on_state(&mut self, state: TurnState) {
        lock_unpoisoned(&self.state).states.push(state);
    }
}

/// Store whose writes always fail.
#[derive(Debug, Default)]
pub struct FailingStore;

impl KeyValueStore for FailingStore {
    fn get(&self, _key: &str) -> Result<Option<String>, SessionStoreError> {
        Ok(None)
    }

    fn set(&mut self, _key: &str, _value: &str) -> Result<(), SessionStoreError> {
        Err(SessionStoreError::io(
            "writing snapshot",
            "/unwritable",
            io::Error::other("disk full"),
        ))
    }

    fn delete(&mut self, _key: &str) -> Result<bool, SessionStoreError> {
        Ok(false)
    }

    fn keys(&self) -> Result<Vec<String>, SessionStoreError> {
        Ok(Vec::new())
    }
}

pub struct Harness {
    pub controller: SessionController,
    pub transport: Arc<Mutex<TransportTrace>>,
    pub observed: Arc<Mutex<ObserverTrace>>,
    pub backend: MemoryStore,
}

impl Harness {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self::with_backend(scripts, MemoryStore::new())
    }

    pub fn with_backend(scripts: Vec<Script>, backend: MemoryStore) -> Self {
        let (transport, transport_state) = ScriptedTransport::new(scripts);
        let mut controller = SessionController::new(
            transport,
            SessionStore::new(backend.clone()),
            settings(),
        );
        lock_unpoisoned(&transport_state).cancel_handle = Some(controller.cancel_handle());

        let (observer, observed) = RecordingObserver::new();
        controller.subscribe(Box::new(observer));

        Self {
            controller,
            transport: transport_state,
            observed,
            backend,
        }
    }

    pub fn push_script(&self, script: Script) {
        lock_unpoisoned(&self.transport).scripts.push_back(script);
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        lock_unpoisoned(&self.transport).requests.clone()
    }

    pub fn states(&self) -> Vec<TurnState> {
        lock_unpoisoned(&self.observed).states.clone()
    }

    pub fn observed_metrics(&self) -> Vec<Metrics> {
        lock_unpoisoned(&self.observed).metrics.clone()
    }

    pub fn observed_transcripts(&self) -> Vec<Vec<Message>> {
        lock_unpoisoned(&self.observed).transcripts.clone()
    }

    pub fn writes(&self) -> usize {
        self.backend.write_count()
    }
}

pub fn settings() -> TurnSettings {
    TurnSettings {
        model: MODEL.to_string(),
        enable_tools: true,
    }
}

pub fn frame(payload: Value) -> Vec<u8> {
    format!("data: {payload}\n\n").into_bytes()
}

pub fn content(text: &str) -> Vec<u8> {
    frame(json!({ "choices": [{ "index": 0, "delta": { "content": text } }] }))
}

pub fn tool(name: &str, status: &str) -> Vec<u8> {
    frame(json!({
        "choices": [{ "delta": { "used_tool": true, "status": status, "tool_name": name } }]
    }))
}

pub fn usage(prompt: u64, completion: u64, total: u64) -> Vec<u8> {
    frame(json!({
        "choices": [],
        "usage": {
            "prompt_tokens": prompt,
            "completion_tokens": completion,
            "total_tokens": total
        }
    }))
}

pub fn done() -> Vec<u8> {
    b"data: [DONE]\n\n".to_vec()
}

pub fn chunks(parts: Vec<Vec<u8>>) -> Script {
    Script::Open(parts.into_iter().map(Step::Chunk).collect())
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
