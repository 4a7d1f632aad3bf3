use time::OffsetDateTime;
use uuid::Uuid;

use crate::error::SessionStoreError;

pub const SESSION_KEY_PREFIX: &str = "chat-";

/// Generate a fresh session id: `{unix_millis}-{8 hex chars}`.
///
/// The millisecond prefix makes ids sort by creation time.
#[must_use]
pub fn new_session_id() -> String {
    let millis = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000;
    let suffix = Uuid::new_v4().simple().to_string();
    format!("{millis}-{}", &suffix[..8])
}

/// Accepts ids with or without the storage prefix.
pub fn normalize_session_id(id: &str) -> Result<String, SessionStoreError> {
    let trimmed = id.trim();
    let bare = trimmed.strip_prefix(SESSION_KEY_PREFIX).unwrap_or(trimmed);
    if bare.is_empty() {
        return Err(SessionStoreError::EmptySessionId);
    }
    Ok(bare.to_string())
}

pub fn session_key(id: &str) -> Result<String, SessionStoreError> {
    Ok(format!("{SESSION_KEY_PREFIX}{}", normalize_session_id(id)?))
}

/// Sort key for newest-first listing; ids without a numeric prefix sort last.
pub(crate) fn creation_millis(id: &str) -> Option<i128> {
    id.split('-').next().and_then(|prefix| prefix.parse().ok())
}

pub(crate) fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'))
}
