use std::cmp::Reverse;

use tracing::{debug, warn};

use crate::backend::KeyValueStore;
use crate::error::SessionStoreError;
use crate::keys::{creation_millis, normalize_session_id, session_key, SESSION_KEY_PREFIX};
use crate::schema::{ChatSnapshot, SessionSummary, StoredSnapshot};

/// Snapshot persistence keyed by session id.
pub struct SessionStore {
    backend: Box<dyn KeyValueStore>,
}

impl SessionStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    /// Overwrites the snapshot stored for `id`.
    pub fn write(&mut self, id: &str, snapshot: &ChatSnapshot) -> Result<(), SessionStoreError> {
        let key = session_key(id)?;
        let encoded = serde_json::to_string(snapshot)
            .map_err(|source| SessionStoreError::json_serialize(&key, source))?;
        self.backend.set(&key, &encoded)?;
        debug!(
            key = %key,
            messages = snapshot.messages.len(),
            context_usage = snapshot.context_usage,
            "session snapshot written"
        );
        Ok(())
    }

    /// Reads a snapshot, upgrading the legacy bare-list shape.
    pub fn read(&self, id: &str) -> Result<Option<ChatSnapshot>, SessionStoreError> {
        let key = session_key(id)?;
        let Some(raw) = self.backend.get(&key)? else {
            return Ok(None);
        };
        let stored: StoredSnapshot = serde_json::from_str(&raw)
            .map_err(|source| SessionStoreError::json_parse(&key, source))?;
        Ok(Some(stored.into()))
    }

    pub fn delete(&mut self, id: &str) -> Result<bool, SessionStoreError> {
        let key = session_key(id)?;
        self.backend.delete(&key)
    }

    /// Stored sessions, newest first. Unreadable entries are skipped.
    pub fn list(&self) -> Result<Vec<SessionSummary>, SessionStoreError> {
        let mut summaries = Vec::new();
        for key in self.backend.keys()? {
            let Some(Ok(id)) = key.strip_prefix(SESSION_KEY_PREFIX).map(normalize_session_id) else {
                continue;
            };
            match self.read(&id) {
                Ok(Some(snapshot)) => summaries.push(SessionSummary {
                    title: snapshot.title(),
                    message_count: snapshot.messages.len(),
                    context_usage: snapshot.context_usage,
                    id,
                }),
                Ok(None) => {}
                Err(error) => warn!(key = %key, error = %error, "skipping unreadable session"),
            }
        }
        summaries.sort_by_key(|summary| Reverse(creation_millis(&summary.id)));
        Ok(summaries)
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore").finish_non_exhaustive()
    }
}
