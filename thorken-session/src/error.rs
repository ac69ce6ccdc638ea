//! Error types for session operations.

use thiserror::Error;
use thorken_jwt::TokenError;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Session-specific errors.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Caller input rejected before touching the store
    #[error("Validation error: {0}")]
    Validation(String),

    /// Credential does not have the expected structure
    #[error("jwt malformed")]
    MalformedToken,

    /// Credential is well-formed but failed verification
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// No live session matches the token
    #[error("unknown token")]
    UnknownToken,

    /// The store did not confirm the native expiry on a token record
    #[error("cannot set expiration on token: {0}")]
    ExpirationSet(String),

    /// Unexpected failure from the backing store
    #[error("Store error: {0}")]
    Store(String),

    /// Token could not be signed
    #[error("Signing error: {0}")]
    Signing(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// Cleanup scheduler already running
    #[error("Cleanup scheduler already running")]
    SchedulerAlreadyRunning,
}

impl SessionError {
    /// Check if this error means the presented credential should be refused.
    ///
    /// A web layer maps these to `401 Unauthorized`.
    pub fn is_unauthorized(&self) -> bool {
        matches!(
            self,
            Self::MalformedToken | Self::InvalidToken(_) | Self::UnknownToken
        )
    }

    /// Check if this error came from the backing store.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Self::Store(_) | Self::ExpirationSet(_))
    }
}

impl From<TokenError> for SessionError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed => Self::MalformedToken,
            TokenError::Invalid(reason) => Self::InvalidToken(reason),
            TokenError::Encoding(e) => Self::Signing(e.to_string()),
            TokenError::Config(reason) => Self::Config(reason),
        }
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for SessionError {
    fn from(err: redis::RedisError) -> Self {
        Self::Store(err.to_string())
    }
}
