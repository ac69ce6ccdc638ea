//! Bearer-token request authentication.

use crate::error::{SessionError, SessionResult};
use crate::manager::SessionManager;
use serde::Serialize;
use std::sync::Arc;

const BEARER_PREFIX: &str = "Bearer ";

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthenticatedUser {
    /// Session owner
    pub id: String,
    pub token: String,
    /// Deadline after this request, in epoch milliseconds
    pub expires_at: i64,
    pub ip: Option<String>,
}

/// Extract the token from an `Authorization: Bearer <token>` header value.
pub fn extract_bearer(header: Option<&str>) -> SessionResult<&str> {
    header
        .and_then(|value| value.strip_prefix(BEARER_PREFIX))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .ok_or(SessionError::MalformedToken)
}

/// Authenticates requests against a [`SessionManager`].
///
/// Framework-agnostic: hand it the raw `Authorization` header and map
/// errors with [`SessionError::is_unauthorized`] to a 401.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use thorken_session::{NewSession, SessionConfig, SessionGuard, SessionManager};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), thorken_session::SessionError> {
/// let config = SessionConfig::builder().secret("s3cret").cleanup_manual(true).build()?;
/// let manager = Arc::new(SessionManager::in_memory(config)?);
/// let token = manager.create(NewSession::new("alice")).await?;
///
/// let guard = SessionGuard::new(manager);
/// let user = guard.authenticate(Some(&format!("Bearer {token}"))).await?;
/// assert_eq!(user.id, "alice");
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct SessionGuard {
    manager: Arc<SessionManager>,
    extend_on_access: bool,
}

impl SessionGuard {
    pub fn new(manager: Arc<SessionManager>) -> Self {
        Self {
            manager,
            extend_on_access: true,
        }
    }

    /// Whether each authenticated request pushes the deadline out by the
    /// default TTL. Enabled by default.
    pub fn extend_on_access(mut self, extend: bool) -> Self {
        self.extend_on_access = extend;
        self
    }

    pub fn manager(&self) -> &Arc<SessionManager> {
        &self.manager
    }

    /// Resolve the session named by an `Authorization` header.
    pub async fn authenticate(&self, authorization: Option<&str>) -> SessionResult<AuthenticatedUser> {
        let token = extract_bearer(authorization)?;
        let session = self.manager.get(token).await?;

        let expires_at = if self.extend_on_access {
            self.manager.extend(token, None).await?
        } else {
            session.expires_at
        };

        Ok(AuthenticatedUser {
            id: session.uid,
            token: token.to_string(),
            expires_at,
            ip: session.ip,
        })
    }
}
