// Session token codec

use crate::{Result, SessionClaims, TokenConfig, TokenError};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, TokenData, Validation, decode, encode};

/// Signs and verifies session tokens.
///
/// Every operation that needs to decode a token goes through [`TokenCodec::verify`],
/// so the mapping from decoding failures to [`TokenError::Malformed`] and
/// [`TokenError::Invalid`] is the same everywhere.
#[derive(Clone)]
pub struct TokenCodec {
    config: TokenConfig,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenCodec {
    /// Create a new codec
    pub fn new(config: TokenConfig) -> Result<Self> {
        let encoding_key = config.encoding_key()?;
        let decoding_key = config.decoding_key()?;
        let validation = config.validation();

        Ok(Self {
            config,
            encoding_key,
            decoding_key,
            validation,
        })
    }

    /// Issue a token for `uid`, stamped with `issued_at` (epoch milliseconds).
    pub fn sign(&self, uid: &str, issued_at: i64) -> Result<String> {
        let claims = SessionClaims::new(uid, issued_at);
        let header = Header::new(self.config.algorithm);
        encode(&header, &claims, &self.encoding_key).map_err(TokenError::from)
    }

    /// Verify a token and return its claims.
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        if !is_well_formed(token) {
            return Err(TokenError::Malformed);
        }

        let data: TokenData<SessionClaims> = decode(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;

        if data.claims.uid.is_empty() {
            return Err(TokenError::Invalid("missing uid".to_string()));
        }

        Ok(data.claims)
    }

    /// Verify a token against an explicit secret with the default algorithm.
    pub fn verify_with_secret(token: &str, secret: &str) -> Result<SessionClaims> {
        Self::new(TokenConfig::new(secret))?.verify(token)
    }

    /// Get the configuration
    pub fn config(&self) -> &TokenConfig {
        &self.config
    }
}

/// Structural check: exactly three `.`-separated segments.
pub fn is_well_formed(token: &str) -> bool {
    !token.is_empty() && token.split('.').count() == 3
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::Algorithm;

    fn codec(secret: &str) -> TokenCodec {
        TokenCodec::new(TokenConfig::new(secret)).unwrap()
    }

    #[test]
    fn test_sign_and_verify() {
        let codec = codec("secret");
        let token = codec.sign("1", 1_700_000_000_000).unwrap();

        let claims = codec.verify(&token).unwrap();
        assert_eq!(claims.uid, "1");
        assert_eq!(claims.ts, 1_700_000_000_000);
    }

    #[test]
    fn test_same_instant_tokens_differ() {
        let codec = codec("secret");
        let a = codec.sign("1", 10).unwrap();
        let b = codec.sign("1", 10).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_malformed_token() {
        let codec = codec("secret");

        assert!(matches!(codec.verify("invalid token"), Err(TokenError::Malformed)));
        assert!(matches!(codec.verify(""), Err(TokenError::Malformed)));
        assert!(matches!(codec.verify("a.b"), Err(TokenError::Malformed)));
        assert!(matches!(codec.verify("a.b.c.d"), Err(TokenError::Malformed)));
    }

    #[test]
    fn test_invalid_token() {
        let codec = codec("secret");
        assert!(matches!(codec.verify("a.a.b"), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_invalid_signature() {
        let token = codec("secret1").sign("1", 0).unwrap();
        let result = codec("secret2").verify(&token);

        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_algorithm_mismatch() {
        let hs512 = TokenCodec::new(TokenConfig::new("secret").with_algorithm(Algorithm::HS512))
            .unwrap();
        let token = hs512.sign("1", 0).unwrap();

        assert!(matches!(codec("secret").verify(&token), Err(TokenError::Invalid(_))));
    }

    #[test]
    fn test_verify_with_secret() {
        let token = codec("shared").sign("9", 0).unwrap();

        let claims = TokenCodec::verify_with_secret(&token, "shared").unwrap();
        assert_eq!(claims.uid, "9");
        assert!(TokenCodec::verify_with_secret(&token, "other").is_err());
    }

    #[test]
    fn test_well_formed() {
        assert!(is_well_formed("a.a.b"));
        assert!(!is_well_formed("invalid token"));
    }
}
