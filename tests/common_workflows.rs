//! Integration tests for common Thorken workflows.
//!
//! These tests drive the facade crate the way an application would.

use std::sync::Arc;
use std::time::Duration;
use thorken::prelude::*;

fn manager() -> Arc<SessionManager> {
    let config = SessionConfig::builder()
        .secret("workflow-secret")
        .namespace("workflows")
        .cleanup_manual(true)
        .build()
        .unwrap();
    Arc::new(SessionManager::in_memory(config).unwrap())
}

// =============================================================================
// Login / Request / Logout
// =============================================================================

#[tokio::test]
async fn test_login_request_logout() {
    let manager = manager();
    let guard = SessionGuard::new(manager.clone());

    // Login
    let token = manager
        .create(NewSession::new("alice").with_ip("203.0.113.9"))
        .await
        .unwrap();

    // Authenticated request
    let user = guard
        .authenticate(Some(&format!("Bearer {}", token)))
        .await
        .unwrap();
    assert_eq!(user.id, "alice");
    assert_eq!(user.ip.as_deref(), Some("203.0.113.9"));

    // Logout
    assert!(manager.destroy(&token).await.unwrap());
    let err = guard
        .authenticate(Some(&format!("Bearer {}", token)))
        .await
        .unwrap_err();
    assert!(matches!(err, SessionError::UnknownToken));
}

// =============================================================================
// Logout Everywhere
// =============================================================================

#[tokio::test]
async fn test_logout_everywhere() {
    let manager = manager();

    let laptop = manager.create(NewSession::new("bob")).await.unwrap();
    let phone = manager.create(NewSession::new("bob")).await.unwrap();
    let other = manager.create(NewSession::new("carol")).await.unwrap();

    let mut tokens = vec![laptop.clone(), phone.clone()];
    tokens.sort();
    assert_eq!(manager.user_tokens("bob").await.unwrap(), tokens);

    assert!(manager.destroy_user("bob").await.unwrap());

    assert!(manager.get(&laptop).await.is_err());
    assert!(manager.get(&phone).await.is_err());
    assert!(manager.get(&other).await.is_ok());
}

// =============================================================================
// Expiry
// =============================================================================

#[tokio::test]
async fn test_short_session_expires_and_is_swept() {
    let manager = manager();

    let token = manager
        .create(NewSession::new("dave").with_ttl(Duration::from_millis(20)))
        .await
        .unwrap();
    assert!(manager.get(&token).await.is_ok());

    tokio::time::sleep(Duration::from_millis(40)).await;

    assert!(matches!(
        manager.get(&token).await,
        Err(SessionError::UnknownToken)
    ));
    assert_eq!(manager.cleanup(false).await.unwrap(), 1);
    assert!(manager.user_tokens("dave").await.unwrap().is_empty());
}

#[test]
fn test_tokens_do_not_carry_expiry() {
    let codec = TokenCodec::new(thorken::TokenConfig::new("workflow-secret")).unwrap();
    let token = codec.sign("erin", 1_700_000_000_000).unwrap();

    let claims = codec.verify(&token).unwrap();
    assert_eq!(claims.uid, "erin");
    assert!(claims.issued_at().is_some());
}
