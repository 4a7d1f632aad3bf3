mod backend;
mod error;
mod keys;
mod schema;
mod store;

pub use backend::{FileStore, KeyValueStore, MemoryStore};
pub use error::SessionStoreError;
pub use keys::{new_session_id, normalize_session_id, session_key, SESSION_KEY_PREFIX};
pub use schema::{ChatSnapshot, SessionSummary};
pub use store::SessionStore;
