//! In-process session index.
//!
//! Mirrors the Redis data model key for key (hashes, sets and one sorted
//! set, with lazily enforced per-key expiry) so the manager behaves the same
//! against either backend. Each operation runs under one lock, which gives
//! it the same all-or-nothing visibility as a Redis transaction.

use crate::error::SessionResult;
use crate::keys::{IndexEntry, KeySchema};
use crate::traits::{Reschedule, SessionIndex, SessionRecord, SweepWindow, UserRemoval};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
struct StoredRecord {
    record: SessionRecord,
    /// Native expiry in epoch milliseconds
    deadline: Option<i64>,
}

#[derive(Debug, Default)]
struct State {
    records: HashMap<String, StoredRecord>,
    sets: HashMap<String, HashSet<String>>,
    sorted: HashMap<String, HashMap<String, i64>>,
}

impl State {
    /// Look up a record, evicting it first if its native expiry has passed.
    fn live_record(&mut self, key: &str, now: i64) -> Option<&mut StoredRecord> {
        let expired = self
            .records
            .get(key)
            .and_then(|stored| stored.deadline)
            .is_some_and(|deadline| deadline <= now);

        if expired {
            self.records.remove(key);
            return None;
        }

        self.records.get_mut(key)
    }

    fn delete_record(&mut self, key: &str, now: i64) -> bool {
        self.live_record(key, now).is_some() && self.records.remove(key).is_some()
    }

    fn set_add(&mut self, key: &str, member: &str) {
        self.sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string());
    }

    fn set_remove(&mut self, key: &str, member: &str) -> bool {
        let Some(set) = self.sets.get_mut(key) else {
            return false;
        };
        let removed = set.remove(member);
        if set.is_empty() {
            self.sets.remove(key);
        }
        removed
    }

    fn sorted_add(&mut self, key: &str, member: String, score: i64) {
        self.sorted
            .entry(key.to_string())
            .or_default()
            .insert(member, score);
    }

    fn sorted_score(&self, key: &str, member: &str) -> Option<i64> {
        self.sorted.get(key).and_then(|zset| zset.get(member)).copied()
    }

    fn sorted_remove(&mut self, key: &str, member: &str) -> bool {
        let Some(zset) = self.sorted.get_mut(key) else {
            return false;
        };
        let removed = zset.remove(member).is_some();
        if zset.is_empty() {
            self.sorted.remove(key);
        }
        removed
    }
}

/// In-memory [`SessionIndex`] backend.
///
/// Useful for tests and single-process deployments. Clones share the same
/// underlying data.
#[derive(Debug, Clone)]
pub struct MemorySessionIndex {
    keys: KeySchema,
    state: Arc<Mutex<State>>,
}

impl MemorySessionIndex {
    /// Create an empty index for `keys`.
    pub fn new(keys: KeySchema) -> Self {
        Self {
            keys,
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    /// A view over the same data under another namespace, the way two
    /// managers share one Redis database.
    pub fn with_namespace(&self, keys: KeySchema) -> Self {
        Self {
            keys,
            state: Arc::clone(&self.state),
        }
    }

    /// Key layout in use.
    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }

    /// Every live key under this index's namespace, sorted.
    pub fn stored_keys(&self) -> Vec<String> {
        let now = now_ms();
        let prefix = self.keys.namespace_key().to_string();
        let mut state = self.state.lock();

        state
            .records
            .retain(|_, stored| stored.deadline.is_none_or(|deadline| deadline > now));

        let mut keys: Vec<String> = state
            .records
            .keys()
            .chain(state.sets.keys())
            .chain(state.sorted.keys())
            .filter(|key| key.starts_with(&prefix))
            .cloned()
            .collect();
        keys.sort();
        keys
    }

    /// Global index members with their scores, lowest score first.
    pub fn entries(&self) -> Vec<(String, i64)> {
        let state = self.state.lock();
        let mut entries: Vec<(String, i64)> = state
            .sorted
            .get(&self.keys.list())
            .map(|zset| zset.iter().map(|(m, s)| (m.clone(), *s)).collect())
            .unwrap_or_default();
        entries.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        entries
    }
}

#[async_trait]
impl SessionIndex for MemorySessionIndex {
    async fn insert(&self, token: &str, record: &SessionRecord) -> SessionResult<()> {
        let entry = IndexEntry::new(record.uid.clone(), token);
        let mut state = self.state.lock();

        state.sorted_add(&self.keys.list(), entry.member(), record.expires_at);
        state.set_add(&self.keys.user(&record.uid), token);
        state
            .records
            .entry(self.keys.token(token))
            .and_modify(|stored| stored.record = record.clone())
            .or_insert_with(|| StoredRecord {
                record: record.clone(),
                deadline: None,
            });

        Ok(())
    }

    async fn expire_at(&self, token: &str, expires_at: i64) -> SessionResult<bool> {
        let now = now_ms();
        let key = self.keys.token(token);
        let mut state = self.state.lock();

        match state.live_record(&key, now) {
            Some(stored) => {
                stored.deadline = Some(expires_at);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn fetch(&self, token: &str) -> SessionResult<Option<SessionRecord>> {
        let now = now_ms();
        let key = self.keys.token(token);
        let mut state = self.state.lock();

        Ok(state.live_record(&key, now).map(|stored| stored.record.clone()))
    }

    async fn reschedule(&self, entry: &IndexEntry, expires_at: i64) -> SessionResult<Reschedule> {
        let now = now_ms();
        let key = self.keys.token(&entry.token);
        let mut state = self.state.lock();

        match state.live_record(&key, now) {
            Some(stored) => {
                stored.record.expires_at = expires_at;
                stored.deadline = Some(expires_at);
            }
            None => return Ok(Reschedule::Missing),
        }

        state.sorted_add(&self.keys.list(), entry.member(), expires_at);
        state.set_add(&self.keys.user(&entry.uid), &entry.token);

        Ok(Reschedule::Applied)
    }

    async fn remove(&self, entry: &IndexEntry) -> SessionResult<bool> {
        let now = now_ms();
        let mut state = self.state.lock();

        let existed = state.delete_record(&self.keys.token(&entry.token), now);
        state.set_remove(&self.keys.user(&entry.uid), &entry.token);
        state.sorted_remove(&self.keys.list(), &entry.member());

        Ok(existed)
    }

    async fn remove_user(&self, uid: &str) -> SessionResult<UserRemoval> {
        let now = now_ms();
        let user_key = self.keys.user(uid);
        let list_key = self.keys.list();
        let mut state = self.state.lock();

        let tokens: Vec<String> = state
            .sets
            .remove(&user_key)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();

        let mut removal = UserRemoval {
            tokens: tokens.len(),
            index_deleted: !tokens.is_empty(),
            ..Default::default()
        };

        for token in &tokens {
            if state.delete_record(&self.keys.token(token), now) {
                removal.records_deleted += 1;
            }
            if state.sorted_remove(&list_key, &IndexEntry::new(uid, token.as_str()).member()) {
                removal.entries_removed += 1;
            }
        }

        Ok(removal)
    }

    async fn scan(&self, window: SweepWindow) -> SessionResult<Vec<IndexEntry>> {
        Ok(self
            .entries()
            .into_iter()
            .filter(|(_, score)| window.contains(*score))
            .filter_map(|(member, _)| IndexEntry::parse(&member))
            .collect())
    }

    async fn evict(&self, entry: &IndexEntry, window: SweepWindow) -> SessionResult<bool> {
        let now = now_ms();
        let list_key = self.keys.list();
        let member = entry.member();
        let mut state = self.state.lock();

        match state.sorted_score(&list_key, &member) {
            Some(score) if window.contains(score) => {}
            _ => return Ok(false),
        }

        state.sorted_remove(&list_key, &member);
        state.set_remove(&self.keys.user(&entry.uid), &entry.token);
        state.delete_record(&self.keys.token(&entry.token), now);

        Ok(true)
    }

    async fn user_tokens(&self, uid: &str) -> SessionResult<Vec<String>> {
        let state = self.state.lock();
        let mut tokens: Vec<String> = state
            .sets
            .get(&self.keys.user(uid))
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        tokens.sort();
        Ok(tokens)
    }

    async fn remaining_ttl(&self, token: &str) -> SessionResult<Option<Duration>> {
        let now = now_ms();
        let key = self.keys.token(token);
        let mut state = self.state.lock();

        Ok(state
            .live_record(&key, now)
            .and_then(|stored| stored.deadline)
            .map(|deadline| Duration::from_millis((deadline - now).max(0) as u64)))
    }
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
