//! Session lifecycle operations.

use crate::config::SessionConfig;
use crate::error::{SessionError, SessionResult};
use crate::keys::IndexEntry;
use crate::memory_session::MemorySessionIndex;
use crate::scheduler::{CleanupScheduler, Sweeper};
use crate::traits::{Reschedule, SessionIndex, SessionRecord, SweepWindow};
use chrono::Utc;
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use thorken_jwt::TokenCodec;
use tracing::{debug, info, warn};

/// Parameters of a session to create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewSession {
    /// Owner identity, normalized to a string
    pub uid: String,
    /// Lifetime; the configured default when `None`
    pub ttl: Option<Duration>,
    /// Client address to record
    pub ip: Option<String>,
}

impl NewSession {
    /// Session for `uid` with the default TTL and no ip.
    pub fn new(uid: impl ToString) -> Self {
        Self {
            uid: uid.to_string(),
            ttl: None,
            ip: None,
        }
    }

    /// Override the TTL.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Record the client address.
    pub fn with_ip(mut self, ip: impl Into<String>) -> Self {
        self.ip = Some(ip.into());
        self
    }
}

/// Creates, reads, extends and destroys token-backed sessions.
///
/// Tokens are signed by [`TokenCodec`]; liveness is decided solely by the
/// [`SessionIndex`]. Unless `cleanup_manual` is set, constructing a manager
/// starts a [`CleanupScheduler`] on the current Tokio runtime.
///
/// # Examples
///
/// ```
/// use thorken_session::{NewSession, SessionConfig, SessionManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), thorken_session::SessionError> {
/// let config = SessionConfig::builder().secret("s3cret").build()?;
/// let manager = SessionManager::in_memory(config)?;
///
/// let token = manager.create(NewSession::new(42).with_ip("10.0.0.1")).await?;
/// let session = manager.get(&token).await?;
/// assert_eq!(session.uid, "42");
///
/// manager.destroy(&token).await?;
/// # Ok(())
/// # }
/// ```
pub struct SessionManager {
    codec: TokenCodec,
    index: Arc<dyn SessionIndex>,
    config: SessionConfig,
    sweeper: Sweeper,
    scheduler: Mutex<CleanupScheduler>,
}

impl SessionManager {
    /// Create a manager over `index`.
    pub fn new(config: SessionConfig, index: Arc<dyn SessionIndex>) -> SessionResult<Self> {
        config.validate()?;

        let codec = TokenCodec::new(config.token_config())?;
        let sweeper = Sweeper::new(index.clone());
        let mut scheduler = CleanupScheduler::new(sweeper.clone(), config.cleanup_interval);

        if !config.cleanup_manual {
            scheduler.start()?;
        }

        debug!(
            namespace = %config.namespace,
            default_ttl_secs = config.default_ttl.as_secs(),
            cleanup_manual = config.cleanup_manual,
            "Session manager initialized"
        );

        Ok(Self {
            codec,
            index,
            config,
            sweeper,
            scheduler: Mutex::new(scheduler),
        })
    }

    /// Create a manager backed by an in-process index.
    pub fn in_memory(config: SessionConfig) -> SessionResult<Self> {
        let index = Arc::new(MemorySessionIndex::new(config.keys()));
        Self::new(config, index)
    }

    /// Create a manager backed by Redis at `config.redis_url`.
    #[cfg(feature = "redis")]
    pub async fn connect(config: SessionConfig) -> SessionResult<Self> {
        config.validate()?;
        let index = Arc::new(crate::redis_session::RedisSessionIndex::connect(&config).await?);
        Self::new(config, index)
    }

    /// Create a session and return its token.
    ///
    /// # Errors
    ///
    /// `Validation` for an empty uid or a TTL too large to represent,
    /// `ExpirationSet` when the store refuses the record's native expiry.
    pub async fn create(&self, session: NewSession) -> SessionResult<String> {
        if session.uid.is_empty() {
            return Err(SessionError::Validation("uid must not be empty".to_string()));
        }

        let now = Utc::now().timestamp_millis();
        let expires_at = self.deadline(now, session.ttl)?;
        let token = self.codec.sign(&session.uid, now)?;
        let record = SessionRecord::new(session.uid, expires_at, session.ip);

        self.index.insert(&token, &record).await?;

        if !self.index.expire_at(&token, expires_at).await? {
            warn!(token = %token_hint(&token), "Store refused token record expiry");
            return Err(SessionError::ExpirationSet(token_hint(&token).to_string()));
        }

        info!(
            uid = %record.uid,
            token = %token_hint(&token),
            expires_at = expires_at,
            "Session created"
        );

        Ok(token)
    }

    /// Look up the live session behind `token`.
    ///
    /// Verification and the lookup run concurrently; a verification failure
    /// wins over whatever the store returned.
    pub async fn get(&self, token: &str) -> SessionResult<SessionRecord> {
        let (verified, record) =
            tokio::join!(async { self.codec.verify(token) }, self.index.fetch(token));

        verified?;

        record?.ok_or(SessionError::UnknownToken)
    }

    /// Push the session's deadline to now + `ttl` (default TTL when `None`)
    /// and return the new deadline.
    pub async fn extend(&self, token: &str, ttl: Option<Duration>) -> SessionResult<i64> {
        let record = self.get(token).await?;

        let expires_at = self.deadline(Utc::now().timestamp_millis(), ttl)?;
        let entry = IndexEntry::new(record.uid, token);

        match self.index.reschedule(&entry, expires_at).await? {
            Reschedule::Applied => {
                debug!(
                    token = %token_hint(token),
                    expires_at = expires_at,
                    "Session extended"
                );
                Ok(expires_at)
            }
            Reschedule::Missing => Err(SessionError::UnknownToken),
            Reschedule::ExpiryRejected => {
                Err(SessionError::ExpirationSet(token_hint(token).to_string()))
            }
        }
    }

    /// Destroy one session. Returns whether it existed.
    pub async fn destroy(&self, token: &str) -> SessionResult<bool> {
        let claims = self.codec.verify(token)?;
        let entry = IndexEntry::new(claims.uid, token);

        let existed = self.index.remove(&entry).await?;

        debug!(
            uid = %entry.uid,
            token = %token_hint(token),
            existed = existed,
            "Session destroyed"
        );

        Ok(existed)
    }

    /// Destroy every session of `uid`.
    ///
    /// Returns true only when every token record, every global index entry
    /// and the user index itself were removed; false means some or all of it
    /// was already gone.
    pub async fn destroy_user(&self, uid: &str) -> SessionResult<bool> {
        if uid.is_empty() {
            return Err(SessionError::Validation("uid must not be empty".to_string()));
        }

        let removal = self.index.remove_user(uid).await?;

        info!(
            uid = %uid,
            tokens = removal.tokens,
            records_deleted = removal.records_deleted,
            entries_removed = removal.entries_removed,
            "User sessions destroyed"
        );

        Ok(removal.is_complete())
    }

    /// Sweep expired sessions, or every session when `all` is true.
    /// Returns the number of global index entries removed.
    pub async fn cleanup(&self, all: bool) -> SessionResult<u64> {
        let window = if all {
            SweepWindow::All
        } else {
            SweepWindow::expired_now()
        };

        self.sweeper.run(window).await
    }

    /// Start the periodic sweep.
    pub fn start_cleanup(&self) -> SessionResult<()> {
        self.scheduler.lock().start()
    }

    /// Stop the periodic sweep. Returns whether it was running.
    pub fn stop_cleanup(&self) -> bool {
        self.scheduler.lock().stop()
    }

    /// Check if the periodic sweep is running.
    pub fn is_cleanup_running(&self) -> bool {
        self.scheduler.lock().is_running()
    }

    /// Tokens currently listed for `uid`.
    pub async fn user_tokens(&self, uid: &str) -> SessionResult<Vec<String>> {
        self.index.user_tokens(uid).await
    }

    /// Time left on the record's native expiry.
    pub async fn remaining_ttl(&self, token: &str) -> SessionResult<Option<Duration>> {
        self.index.remaining_ttl(token).await
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn index(&self) -> &Arc<dyn SessionIndex> {
        &self.index
    }

    fn deadline(&self, now: i64, ttl: Option<Duration>) -> SessionResult<i64> {
        let ttl = ttl.unwrap_or(self.config.default_ttl);

        i64::try_from(ttl.as_millis())
            .ok()
            .and_then(|ms| now.checked_add(ms))
            .ok_or_else(|| SessionError::Validation(format!("ttl {:?} is too large", ttl)))
    }
}

/// Leading characters of a token, safe to log.
fn token_hint(token: &str) -> &str {
    token.get(..12).unwrap_or(token)
}
