//! Redis session index implementation.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::keys::{IndexEntry, KeySchema};
use crate::traits::{Reschedule, SessionIndex, SessionRecord, SweepWindow, UserRemoval};
use async_trait::async_trait;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;

/// Rewrites expiresAt, the native expiry and the index score in one step,
/// and only while the record exists, so a concurrent destroy is never undone.
///
/// KEYS: record, list, user. ARGV: expiresAt, member, token.
/// Returns 1 when applied, 0 when the record is gone, -1 when PEXPIREAT failed.
const RESCHEDULE_SCRIPT: &str = r#"
if redis.call('EXISTS', KEYS[1]) == 0 then
    return 0
end
redis.call('HSET', KEYS[1], 'expiresAt', ARGV[1])
local applied = redis.call('PEXPIREAT', KEYS[1], ARGV[1])
redis.call('ZADD', KEYS[2], ARGV[1], ARGV[2])
redis.call('SADD', KEYS[3], ARGV[3])
if applied == 1 then
    return 1
end
return -1
"#;

/// Reads the user index and deletes everything it references atomically.
///
/// KEYS: user, list. ARGV: token key prefix, uid.
/// Returns {tokens, records deleted, entries removed, user key deleted}.
const REMOVE_USER_SCRIPT: &str = r#"
local tokens = redis.call('SMEMBERS', KEYS[1])
local records = 0
local entries = 0
for _, token in ipairs(tokens) do
    records = records + redis.call('DEL', ARGV[1] .. token)
    entries = entries + redis.call('ZREM', KEYS[2], ARGV[2] .. ':' .. token)
end
local index = redis.call('DEL', KEYS[1])
return { #tokens, records, entries, index }
"#;

/// Removes one swept entry from all three structures if its score is still
/// inside the sweep window.
///
/// KEYS: list, user, record. ARGV: member, token, max score or '+inf'.
const EVICT_SCRIPT: &str = r#"
local score = redis.call('ZSCORE', KEYS[1], ARGV[1])
if not score then
    return 0
end
if ARGV[3] ~= '+inf' and tonumber(score) > tonumber(ARGV[3]) then
    return 0
end
redis.call('ZREM', KEYS[1], ARGV[1])
redis.call('SREM', KEYS[2], ARGV[2])
redis.call('DEL', KEYS[3])
return 1
"#;

/// Redis-backed session index.
///
/// Targets a single Redis node (or a primary with replicas). The user
/// removal script derives token record keys from `ARGV` instead of declaring
/// them in `KEYS`, and the three structures live in different hash slots, so
/// Redis Cluster is not supported.
///
/// # Examples
///
/// ```no_run
/// use thorken_session::{RedisSessionIndex, SessionConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::builder().secret("secret").build()?;
/// let index = RedisSessionIndex::connect(&config).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct RedisSessionIndex {
    conn: ConnectionManager,
    keys: KeySchema,
    reschedule_script: redis::Script,
    remove_user_script: redis::Script,
    evict_script: redis::Script,
}

impl RedisSessionIndex {
    /// Connect using the URL and namespace of `config`.
    pub async fn connect(config: &SessionConfig) -> SessionResult<Self> {
        Self::new(&config.redis_url, config.keys()).await
    }

    /// Connect to `url` and store keys under `keys`.
    pub async fn new(url: &str, keys: KeySchema) -> SessionResult<Self> {
        let client =
            redis::Client::open(url).map_err(|e| SessionError::InvalidUrl(e.to_string()))?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| SessionError::Store(format!("Failed to connect to Redis: {e}")))?;

        tracing::info!(namespace = %keys.namespace_key(), "Connected Redis session index");

        Ok(Self::from_connection(conn, keys))
    }

    /// Wrap an existing connection manager.
    pub fn from_connection(conn: ConnectionManager, keys: KeySchema) -> Self {
        Self {
            conn,
            keys,
            reschedule_script: redis::Script::new(RESCHEDULE_SCRIPT),
            remove_user_script: redis::Script::new(REMOVE_USER_SCRIPT),
            evict_script: redis::Script::new(EVICT_SCRIPT),
        }
    }

    /// Key layout in use.
    pub fn keys(&self) -> &KeySchema {
        &self.keys
    }

    /// Every key under this namespace, sorted.
    ///
    /// Uses `KEYS`; meant for tests and maintenance, not request paths.
    pub async fn stored_keys(&self) -> SessionResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut keys: Vec<String> = redis::cmd("KEYS")
            .arg(self.keys.pattern())
            .query_async(&mut conn)
            .await?;
        keys.sort();
        Ok(keys)
    }

    /// Global index members with their scores, lowest score first.
    pub async fn entries(&self) -> SessionResult<Vec<(String, i64)>> {
        let mut conn = self.conn.clone();
        let entries: Vec<(String, i64)> = conn
            .zrangebyscore_withscores(self.keys.list(), 0, "+inf")
            .await?;
        Ok(entries)
    }
}

#[async_trait]
impl SessionIndex for RedisSessionIndex {
    async fn insert(&self, token: &str, record: &SessionRecord) -> SessionResult<()> {
        let mut conn = self.conn.clone();
        let entry = IndexEntry::new(record.uid.clone(), token);

        let _: () = redis::pipe()
            .atomic()
            .zadd(self.keys.list(), entry.member(), record.expires_at)
            .ignore()
            .sadd(self.keys.user(&record.uid), token)
            .ignore()
            .hset_multiple(self.keys.token(token), &record.fields())
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(())
    }

    async fn expire_at(&self, token: &str, expires_at: i64) -> SessionResult<bool> {
        let mut conn = self.conn.clone();
        let applied: bool = conn.pexpire_at(self.keys.token(token), expires_at).await?;
        Ok(applied)
    }

    async fn fetch(&self, token: &str) -> SessionResult<Option<SessionRecord>> {
        let mut conn = self.conn.clone();
        let fields: HashMap<String, String> = conn.hgetall(self.keys.token(token)).await?;
        SessionRecord::from_fields(fields)
    }

    async fn reschedule(&self, entry: &IndexEntry, expires_at: i64) -> SessionResult<Reschedule> {
        let mut conn = self.conn.clone();

        let outcome: i64 = self
            .reschedule_script
            .key(self.keys.token(&entry.token))
            .key(self.keys.list())
            .key(self.keys.user(&entry.uid))
            .arg(expires_at)
            .arg(entry.member())
            .arg(&entry.token)
            .invoke_async(&mut conn)
            .await?;

        Ok(match outcome {
            1 => Reschedule::Applied,
            0 => Reschedule::Missing,
            _ => Reschedule::ExpiryRejected,
        })
    }

    async fn remove(&self, entry: &IndexEntry) -> SessionResult<bool> {
        let mut conn = self.conn.clone();

        let (deleted,): (i64,) = redis::pipe()
            .atomic()
            .del(self.keys.token(&entry.token))
            .srem(self.keys.user(&entry.uid), &entry.token)
            .ignore()
            .zrem(self.keys.list(), entry.member())
            .ignore()
            .query_async(&mut conn)
            .await?;

        Ok(deleted == 1)
    }

    async fn remove_user(&self, uid: &str) -> SessionResult<UserRemoval> {
        let mut conn = self.conn.clone();

        let counts: Vec<i64> = self
            .remove_user_script
            .key(self.keys.user(uid))
            .key(self.keys.list())
            .arg(self.keys.token_prefix())
            .arg(uid)
            .invoke_async(&mut conn)
            .await?;

        match counts.as_slice() {
            [tokens, records, entries, index] => Ok(UserRemoval {
                tokens: *tokens as usize,
                records_deleted: *records as usize,
                entries_removed: *entries as usize,
                index_deleted: *index == 1,
            }),
            other => Err(SessionError::Store(format!(
                "unexpected reply from user removal script: {:?}",
                other
            ))),
        }
    }

    async fn scan(&self, window: SweepWindow) -> SessionResult<Vec<IndexEntry>> {
        let mut conn = self.conn.clone();
        let members: Vec<String> = conn
            .zrangebyscore(self.keys.list(), 0, window.max_bound())
            .await?;

        Ok(members
            .iter()
            .filter_map(|member| {
                let entry = IndexEntry::parse(member);
                if entry.is_none() {
                    tracing::warn!(member = %member, "Skipping unparsable expiry index member");
                }
                entry
            })
            .collect())
    }

    async fn evict(&self, entry: &IndexEntry, window: SweepWindow) -> SessionResult<bool> {
        let mut conn = self.conn.clone();

        let removed: i64 = self
            .evict_script
            .key(self.keys.list())
            .key(self.keys.user(&entry.uid))
            .key(self.keys.token(&entry.token))
            .arg(entry.member())
            .arg(&entry.token)
            .arg(window.max_bound())
            .invoke_async(&mut conn)
            .await?;

        Ok(removed == 1)
    }

    async fn user_tokens(&self, uid: &str) -> SessionResult<Vec<String>> {
        let mut conn = self.conn.clone();
        let mut tokens: Vec<String> = conn.smembers(self.keys.user(uid)).await?;
        tokens.sort();
        Ok(tokens)
    }

    async fn remaining_ttl(&self, token: &str) -> SessionResult<Option<Duration>> {
        let mut conn = self.conn.clone();
        let ttl: i64 = conn.pttl(self.keys.token(token)).await?;

        if ttl < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(ttl as u64)))
        }
    }
}
