//! Session manager configuration.

use crate::error::{SessionError, SessionResult};
use crate::keys::KeySchema;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thorken_jwt::{Algorithm, TokenConfig};

/// Default key namespace.
pub const DEFAULT_NAMESPACE: &str = "ts";

/// Default session TTL (2 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(7200);

/// Default interval between automatic cleanup sweeps (5 minutes).
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_millis(300_000);

/// Default Redis URL.
pub const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";

/// Session manager configuration.
///
/// Every recognized option lives here with its default; a config is checked
/// once, by [`SessionConfigBuilder::build`] or [`SessionConfig::validate`],
/// before a manager is constructed from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Key namespace isolating this manager's data
    pub namespace: String,
    /// TTL used when a call does not pass one
    #[serde(rename = "ttl_seconds", with = "duration_secs")]
    pub default_ttl: Duration,
    /// Interval between automatic cleanup sweeps
    #[serde(rename = "cleanup_interval_ms", with = "duration_millis")]
    pub cleanup_interval: Duration,
    /// When true no background sweep is started; callers run `cleanup` themselves
    pub cleanup_manual: bool,
    /// Token signing secret
    #[serde(skip_serializing)]
    pub secret: String,
    /// Token signing algorithm
    pub algorithm: Algorithm,
    /// Redis connection URL (only for the Redis backend)
    pub redis_url: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            default_ttl: DEFAULT_TTL,
            cleanup_interval: DEFAULT_CLEANUP_INTERVAL,
            cleanup_manual: false,
            secret: String::new(),
            algorithm: Algorithm::HS256,
            redis_url: DEFAULT_REDIS_URL.to_string(),
        }
    }
}

impl SessionConfig {
    /// Create a builder seeded with the defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use thorken_session::SessionConfig;
    ///
    /// let config = SessionConfig::builder().secret("s3cret").build().unwrap();
    /// assert_eq!(config.namespace, "ts");
    /// ```
    pub fn builder() -> SessionConfigBuilder {
        SessionConfigBuilder::new()
    }

    /// Load configuration from environment variables.
    ///
    /// Recognized: `THORKEN_SECRET`, `THORKEN_NAMESPACE`, `THORKEN_TTL_SECONDS`,
    /// `THORKEN_CLEANUP_INTERVAL_MS`, `THORKEN_CLEANUP_MANUAL`, `REDIS_URL`.
    pub fn from_env() -> SessionConfigBuilder {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> SessionConfigBuilder
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut builder = SessionConfigBuilder::new();

        if let Some(secret) = lookup("THORKEN_SECRET") {
            builder = builder.secret(secret);
        }

        if let Some(namespace) = lookup("THORKEN_NAMESPACE") {
            builder = builder.namespace(namespace);
        }

        if let Some(ttl) = lookup("THORKEN_TTL_SECONDS") {
            match ttl.parse() {
                Ok(secs) => builder = builder.default_ttl(Duration::from_secs(secs)),
                Err(_) => tracing::warn!(value = %ttl, "Ignoring non-numeric THORKEN_TTL_SECONDS"),
            }
        }

        if let Some(interval) = lookup("THORKEN_CLEANUP_INTERVAL_MS") {
            match interval.parse() {
                Ok(ms) => builder = builder.cleanup_interval(Duration::from_millis(ms)),
                Err(_) => tracing::warn!(
                    value = %interval,
                    "Ignoring non-numeric THORKEN_CLEANUP_INTERVAL_MS"
                ),
            }
        }

        if let Some(manual) = lookup("THORKEN_CLEANUP_MANUAL") {
            builder = builder.cleanup_manual(manual == "1" || manual.eq_ignore_ascii_case("true"));
        }

        if let Some(url) = lookup("REDIS_URL") {
            builder = builder.redis_url(url);
        }

        builder
    }

    /// Check every option.
    pub fn validate(&self) -> SessionResult<()> {
        if self.secret.is_empty() {
            return Err(SessionError::Config("secret is required".to_string()));
        }

        if self.namespace.is_empty() {
            return Err(SessionError::Config("namespace must not be empty".to_string()));
        }

        if self.cleanup_interval.is_zero() {
            return Err(SessionError::Config(
                "cleanup interval must be greater than zero".to_string(),
            ));
        }

        if !self.redis_url.starts_with("redis://") && !self.redis_url.starts_with("rediss://") {
            return Err(SessionError::InvalidUrl(
                "Redis URL must start with redis:// or rediss://".to_string(),
            ));
        }

        self.token_config().validate()?;

        Ok(())
    }

    /// Codec configuration derived from the secret and algorithm.
    pub fn token_config(&self) -> TokenConfig {
        TokenConfig::new(self.secret.clone()).with_algorithm(self.algorithm)
    }

    /// Key layout for this namespace.
    pub fn keys(&self) -> KeySchema {
        KeySchema::new(&self.namespace)
    }
}

/// Builder for session configuration.
#[derive(Default)]
pub struct SessionConfigBuilder {
    config: SessionConfig,
}

impl SessionConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self {
            config: SessionConfig::default(),
        }
    }

    /// Set the key namespace.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.config.namespace = namespace.into();
        self
    }

    /// Set the default session TTL.
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.config.default_ttl = ttl;
        self
    }

    /// Set the automatic cleanup interval.
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    /// Disable the background sweep.
    pub fn cleanup_manual(mut self, manual: bool) -> Self {
        self.config.cleanup_manual = manual;
        self
    }

    /// Set the token signing secret.
    pub fn secret(mut self, secret: impl Into<String>) -> Self {
        self.config.secret = secret.into();
        self
    }

    /// Set the token signing algorithm.
    pub fn algorithm(mut self, algorithm: Algorithm) -> Self {
        self.config.algorithm = algorithm;
        self
    }

    /// Set the Redis URL.
    pub fn redis_url(mut self, url: impl Into<String>) -> Self {
        self.config.redis_url = url.into();
        self
    }

    /// Validate and build the configuration.
    pub fn build(self) -> SessionResult<SessionConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        u64::try_from(duration.as_millis())
            .unwrap_or(u64::MAX)
            .serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = SessionConfig::builder().secret("secret").build().unwrap();

        assert_eq!(config.namespace, "ts");
        assert_eq!(config.default_ttl, Duration::from_secs(7200));
        assert_eq!(config.cleanup_interval, Duration::from_millis(300_000));
        assert!(!config.cleanup_manual);
        assert_eq!(config.algorithm, Algorithm::HS256);
    }

    #[test]
    fn test_secret_required() {
        let result = SessionConfig::builder().build();
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_rejects_bad_values() {
        let empty_ns = SessionConfig::builder().secret("s").namespace("").build();
        assert!(matches!(empty_ns, Err(SessionError::Config(_))));

        let zero_interval = SessionConfig::builder()
            .secret("s")
            .cleanup_interval(Duration::ZERO)
            .build();
        assert!(matches!(zero_interval, Err(SessionError::Config(_))));

        let bad_url = SessionConfig::builder()
            .secret("s")
            .redis_url("http://localhost")
            .build();
        assert!(matches!(bad_url, Err(SessionError::InvalidUrl(_))));

        let rsa = SessionConfig::builder()
            .secret("s")
            .algorithm(Algorithm::RS256)
            .build();
        assert!(matches!(rsa, Err(SessionError::Config(_))));
    }

    #[test]
    fn test_from_lookup() {
        let vars: HashMap<&str, &str> = [
            ("THORKEN_SECRET", "env-secret"),
            ("THORKEN_NAMESPACE", "app"),
            ("THORKEN_TTL_SECONDS", "60"),
            ("THORKEN_CLEANUP_INTERVAL_MS", "1500"),
            ("THORKEN_CLEANUP_MANUAL", "true"),
            ("REDIS_URL", "redis://cache:6380"),
        ]
        .into_iter()
        .collect();

        let config = SessionConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))
            .build()
            .unwrap();

        assert_eq!(config.secret, "env-secret");
        assert_eq!(config.namespace, "app");
        assert_eq!(config.default_ttl, Duration::from_secs(60));
        assert_eq!(config.cleanup_interval, Duration::from_millis(1500));
        assert!(config.cleanup_manual);
        assert_eq!(config.redis_url, "redis://cache:6380");
    }

    #[test]
    fn test_from_lookup_ignores_garbage_numbers() {
        let config = SessionConfig::from_lookup(|k| match k {
            "THORKEN_SECRET" => Some("s".to_string()),
            "THORKEN_TTL_SECONDS" => Some("two hours".to_string()),
            _ => None,
        })
        .build()
        .unwrap();

        assert_eq!(config.default_ttl, DEFAULT_TTL);
    }

    #[test]
    fn test_deserialize_units() {
        let json = r#"{"secret":"s","ttl_seconds":10,"cleanup_interval_ms":250,"cleanup_manual":true}"#;
        let config: SessionConfig = serde_json::from_str(json).unwrap();

        assert!(config.validate().is_ok());
        assert_eq!(config.default_ttl, Duration::from_secs(10));
        assert_eq!(config.cleanup_interval, Duration::from_millis(250));
        assert_eq!(config.namespace, "ts");
    }

    #[test]
    fn test_serialize_saturates_huge_interval() {
        let config = SessionConfig {
            secret: "s".to_string(),
            cleanup_interval: Duration::MAX,
            ..Default::default()
        };
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["cleanup_interval_ms"], serde_json::json!(u64::MAX));
    }

    #[test]
    fn test_serialize_omits_secret() {
        let config = SessionConfig::builder().secret("hidden").build().unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains("hidden"));
    }
}
