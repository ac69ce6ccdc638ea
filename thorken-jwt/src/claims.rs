// Session token claims

use serde::{Deserialize, Serialize};

/// Payload carried by every session token.
///
/// There is no `exp` claim. A session's lifetime is tracked in the store and
/// extending a session never reissues its token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionClaims {
    /// Owner identity, always a string
    pub uid: String,

    /// Issue time in epoch milliseconds
    pub ts: i64,

    /// Per-token nonce so two tokens issued in the same millisecond differ
    pub jti: String,
}

impl SessionClaims {
    /// Create claims for `uid` issued at `issued_at` (epoch milliseconds).
    pub fn new(uid: impl Into<String>, issued_at: i64) -> Self {
        Self {
            uid: uid.into(),
            ts: issued_at,
            jti: uuid::Uuid::new_v4().simple().to_string(),
        }
    }

    /// Issue time as a UTC timestamp.
    pub fn issued_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::from_timestamp_millis(self.ts)
    }
}
