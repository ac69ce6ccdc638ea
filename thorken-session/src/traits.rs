//! Storage contract for the three session structures.

use crate::error::{SessionError, SessionResult};
use crate::keys::IndexEntry;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Field names of a token record.
pub const FIELD_UID: &str = "uid";
pub const FIELD_EXPIRES_AT: &str = "expiresAt";
pub const FIELD_IP: &str = "ip";

/// Metadata persisted in a token record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Owner identity
    pub uid: String,
    /// Absolute deadline in epoch milliseconds
    #[serde(rename = "expiresAt")]
    pub expires_at: i64,
    /// Client address recorded at creation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,
}

impl SessionRecord {
    pub fn new(uid: impl Into<String>, expires_at: i64, ip: Option<String>) -> Self {
        Self {
            uid: uid.into(),
            expires_at,
            ip,
        }
    }

    /// Hash fields as written to the store.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            (FIELD_UID, self.uid.clone()),
            (FIELD_EXPIRES_AT, self.expires_at.to_string()),
        ];
        if let Some(ip) = &self.ip {
            fields.push((FIELD_IP, ip.clone()));
        }
        fields
    }

    /// Rebuild a record from stored hash fields.
    ///
    /// An empty map means the record does not exist.
    pub fn from_fields(mut fields: HashMap<String, String>) -> SessionResult<Option<Self>> {
        if fields.is_empty() {
            return Ok(None);
        }

        let uid = fields
            .remove(FIELD_UID)
            .ok_or_else(|| SessionError::Store("token record has no uid".to_string()))?;
        let expires_at = fields
            .get(FIELD_EXPIRES_AT)
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| {
                SessionError::Store("token record has no numeric expiresAt".to_string())
            })?;

        Ok(Some(Self {
            uid,
            expires_at,
            ip: fields.remove(FIELD_IP),
        }))
    }

    /// Deadline as a UTC timestamp.
    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at)
    }

    /// Whether the deadline has passed at `now_ms`.
    pub fn is_expired_at(&self, now_ms: i64) -> bool {
        self.expires_at <= now_ms
    }
}

/// Score range scanned by a sweep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepWindow {
    /// Entries scored from 0 up to `now` (epoch milliseconds)
    Expired { now: i64 },
    /// Every entry regardless of score
    All,
}

impl SweepWindow {
    /// Window for an expired-only sweep at the current time.
    pub fn expired_now() -> Self {
        Self::Expired {
            now: Utc::now().timestamp_millis(),
        }
    }

    /// Whether an entry scored `score` falls in this window.
    pub fn contains(&self, score: i64) -> bool {
        match self {
            Self::Expired { now } => (0..=*now).contains(&score),
            Self::All => true,
        }
    }

    /// Upper score bound in sorted-set range syntax.
    pub fn max_bound(&self) -> String {
        match self {
            Self::Expired { now } => now.to_string(),
            Self::All => "+inf".to_string(),
        }
    }

    /// Whether the sweep deletes every session.
    pub fn is_purge(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Outcome of an atomic expiry rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reschedule {
    /// Record, native expiry and index score all updated
    Applied,
    /// The record no longer exists; nothing was written
    Missing,
    /// The store refused the native expiry
    ExpiryRejected,
}

/// Per-structure counts from removing every session of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UserRemoval {
    /// Tokens listed in the user index
    pub tokens: usize,
    /// Token records deleted
    pub records_deleted: usize,
    /// Global index entries removed
    pub entries_removed: usize,
    /// Whether the user index key itself was deleted
    pub index_deleted: bool,
}

impl UserRemoval {
    /// True when every deletion reported a removal.
    pub fn is_complete(&self) -> bool {
        self.index_deleted
            && self.records_deleted == self.tokens
            && self.entries_removed == self.tokens
    }
}

/// Storage contract behind the session manager.
///
/// Every mutating method is a single atomic unit against the store: either
/// all of its writes become visible or none do.
#[async_trait]
pub trait SessionIndex: Send + Sync {
    /// Write the record, add the token to the user index and add its entry
    /// to the global index scored at `record.expires_at`.
    async fn insert(&self, token: &str, record: &SessionRecord) -> SessionResult<()>;

    /// Set the native expiry of the token record. Returns whether the store
    /// confirmed it.
    async fn expire_at(&self, token: &str, expires_at: i64) -> SessionResult<bool>;

    /// Read a token record. `Ok(None)` if it does not exist.
    async fn fetch(&self, token: &str) -> SessionResult<Option<SessionRecord>>;

    /// Rewrite `expiresAt`, the native expiry and the global index score,
    /// only if the record still exists.
    async fn reschedule(&self, entry: &IndexEntry, expires_at: i64) -> SessionResult<Reschedule>;

    /// Delete the record and both index memberships. Returns whether the
    /// record existed.
    async fn remove(&self, entry: &IndexEntry) -> SessionResult<bool>;

    /// Delete every session owned by `uid` along with the user index.
    async fn remove_user(&self, uid: &str) -> SessionResult<UserRemoval>;

    /// List global index entries inside `window`, lowest score first.
    async fn scan(&self, window: SweepWindow) -> SessionResult<Vec<IndexEntry>>;

    /// Remove one scanned entry from all three structures if its score is
    /// still inside `window`. Returns whether a global index entry was removed.
    async fn evict(&self, entry: &IndexEntry, window: SweepWindow) -> SessionResult<bool>;

    /// Tokens in the user index.
    async fn user_tokens(&self, uid: &str) -> SessionResult<Vec<String>>;

    /// Time left before the record's native expiry, `None` when the record is
    /// missing or has no expiry.
    async fn remaining_ttl(&self, token: &str) -> SessionResult<Option<Duration>>;
}
