//! Token-backed session management for Thorken.
//!
//! A session is identified by a signed token. The token only proves who it
//! was issued to; whether the session is still alive is decided by three
//! coupled structures in the store:
//!
//! - a token record holding `uid`, `expiresAt` and an optional `ip`, with a
//!   native expiry at `expiresAt`
//! - a per-user index of live tokens
//! - one global expiry index scoring `uid:token` by `expiresAt`
//!
//! Every mutation writes all three in one atomic unit. A periodic sweep
//! walks the global index and removes expired sessions.
//!
//! # Features
//!
//! - `redis` - Redis session index (enabled by default)
//!
//! # Examples
//!
//! ```no_run
//! use thorken_session::*;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), SessionError> {
//!     let config = SessionConfig::from_env()
//!         .namespace("myapp")
//!         .default_ttl(Duration::from_secs(3600))
//!         .build()?;
//!
//!     let manager = SessionManager::connect(config).await?;
//!
//!     // Login
//!     let token = manager.create(NewSession::new(123).with_ip("10.1.2.3")).await?;
//!
//!     // Every request
//!     let session = manager.get(&token).await?;
//!     println!("User ID: {}", session.uid);
//!     manager.extend(&token, None).await?;
//!
//!     // Logout, or logout everywhere
//!     manager.destroy(&token).await?;
//!     manager.destroy_user("123").await?;
//!
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod keys;
pub mod manager;
pub mod memory_session;
pub mod scheduler;
pub mod traits;

#[cfg(feature = "redis")]
pub mod redis_session;

pub use config::{SessionConfig, SessionConfigBuilder};
pub use error::{SessionError, SessionResult};
pub use guard::{AuthenticatedUser, SessionGuard, extract_bearer};
pub use keys::{IndexEntry, KeySchema};
pub use manager::{NewSession, SessionManager};
pub use memory_session::MemorySessionIndex;
pub use scheduler::{CleanupScheduler, Sweeper};
pub use traits::{Reschedule, SessionIndex, SessionRecord, SweepWindow, UserRemoval};

#[cfg(feature = "redis")]
pub use redis_session::RedisSessionIndex;

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::SessionConfig;
    pub use crate::error::{SessionError, SessionResult};
    pub use crate::guard::{AuthenticatedUser, SessionGuard};
    pub use crate::manager::{NewSession, SessionManager};
    pub use crate::memory_session::MemorySessionIndex;
    pub use crate::traits::{SessionIndex, SessionRecord};

    #[cfg(feature = "redis")]
    pub use crate::redis_session::RedisSessionIndex;
}
