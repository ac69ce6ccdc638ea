// Token codec configuration

use crate::{Result, TokenError};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Validation};
use std::fmt;

/// Token codec configuration.
///
/// Session tokens are signed with a shared secret, so only the HMAC family
/// of algorithms is accepted.
#[derive(Clone)]
pub struct TokenConfig {
    /// Shared signing secret
    pub secret: String,

    /// Algorithm to use (default: HS256)
    pub algorithm: Algorithm,
}

impl TokenConfig {
    /// Create a new configuration with a secret
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
            algorithm: Algorithm::HS256,
        }
    }

    /// Set the algorithm
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self
    }

    /// Check the secret and algorithm.
    pub fn validate(&self) -> Result<()> {
        if self.secret.is_empty() {
            return Err(TokenError::Config("secret is required".to_string()));
        }

        match self.algorithm {
            Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512 => Ok(()),
            other => Err(TokenError::Config(format!(
                "{:?} is not a shared-secret algorithm",
                other
            ))),
        }
    }

    /// Get encoding key
    pub fn encoding_key(&self) -> Result<EncodingKey> {
        self.validate()?;
        Ok(EncodingKey::from_secret(self.secret.as_bytes()))
    }

    /// Get decoding key
    pub fn decoding_key(&self) -> Result<DecodingKey> {
        self.validate()?;
        Ok(DecodingKey::from_secret(self.secret.as_bytes()))
    }

    /// Validation rules for session tokens.
    ///
    /// Tokens carry no `exp`/`nbf`, so no registered claim is required and
    /// only the signature and algorithm are checked.
    pub fn validation(&self) -> Validation {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = false;
        validation.validate_nbf = false;
        validation.validate_aud = false;
        validation.required_spec_claims.clear();
        validation
    }
}

impl fmt::Debug for TokenConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenConfig")
            .field("secret", &"[REDACTED]")
            .field("algorithm", &self.algorithm)
            .finish()
    }
}
