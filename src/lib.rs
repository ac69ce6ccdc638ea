// Thorken - token-backed session management
//
// Sessions are identified by signed tokens; whether a session is alive is
// decided by the store, which is swept periodically for expired sessions.

// Re-export member crates
pub use thorken_jwt as jwt;
pub use thorken_session as session;

pub use thorken_jwt::{SessionClaims, TokenCodec, TokenConfig, TokenError};
pub use thorken_session::{
    AuthenticatedUser, NewSession, SessionConfig, SessionError, SessionGuard, SessionIndex,
    SessionManager, SessionRecord, SessionResult,
};

#[cfg(feature = "redis")]
pub use thorken_session::RedisSessionIndex;

// Prelude for common imports
pub mod prelude {
    pub use thorken_jwt::{Algorithm, TokenCodec};
    pub use thorken_session::prelude::*;
}
