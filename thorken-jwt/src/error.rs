// Error types for token operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TokenError {
    /// The credential does not have the three-segment JWT shape.
    #[error("jwt malformed")]
    Malformed,

    /// The credential is well-formed but failed decoding or signature checks.
    #[error("invalid token: {0}")]
    Invalid(String),

    #[error("JWT encoding error: {0}")]
    Encoding(#[from] jsonwebtoken::errors::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TokenError {
    /// True for the two failure kinds a caller can cause by presenting a bad credential.
    pub fn is_rejection(&self) -> bool {
        matches!(self, Self::Malformed | Self::Invalid(_))
    }
}

pub type Result<T> = std::result::Result<T, TokenError>;
