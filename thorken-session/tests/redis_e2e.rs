//! End-to-end tests against a live Redis.
//!
//! Run with `cargo test -- --ignored`; `REDIS_URL` selects the server.
//! Each test uses its own namespace and purges it when done.

#![cfg(feature = "redis")]

use chrono::Utc;
use redis::AsyncCommands;
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::time::Duration;
use thorken_jwt::{TokenCodec, TokenConfig};
use thorken_session::*;

const SECRET: &str = "secret";
const DEFAULT_TTL_MS: i64 = 7_200_000;

struct Fixture {
    manager: SessionManager,
    index: RedisSessionIndex,
    conn: ConnectionManager,
}

impl Fixture {
    async fn new(namespace: &str) -> Self {
        let config = SessionConfig::from_env()
            .secret(SECRET)
            .namespace(format!("thorken-e2e-{}", namespace))
            .cleanup_manual(true)
            .build()
            .unwrap();

        let client = redis::Client::open(config.redis_url.as_str()).unwrap();
        let conn = ConnectionManager::new(client).await.unwrap();

        let index = RedisSessionIndex::connect(&config).await.unwrap();
        let manager = SessionManager::new(config, std::sync::Arc::new(index.clone())).unwrap();

        let fixture = Self {
            manager,
            index,
            conn,
        };
        fixture.purge().await;
        fixture
    }

    async fn purge(&self) {
        self.manager.cleanup(true).await.unwrap();
        let mut conn = self.conn.clone();
        for key in self.index.stored_keys().await.unwrap() {
            let _: () = conn.del(key).await.unwrap();
        }
    }

    fn keys(&self) -> &KeySchema {
        self.index.keys()
    }

    async fn record(&self, token: &str) -> HashMap<String, String> {
        let mut conn = self.conn.clone();
        conn.hgetall(self.keys().token(token)).await.unwrap()
    }

    async fn pttl(&self, token: &str) -> i64 {
        let mut conn = self.conn.clone();
        conn.pttl(self.keys().token(token)).await.unwrap()
    }

    async fn user_set(&self, uid: &str) -> Vec<String> {
        let mut conn = self.conn.clone();
        conn.smembers(self.keys().user(uid)).await.unwrap()
    }

    async fn list(&self) -> Vec<String> {
        let mut conn = self.conn.clone();
        conn.zrangebyscore(self.keys().list(), 0, "+inf").await.unwrap()
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_create_writes_record_with_expiry() {
    let fx = Fixture::new("create").await;
    let expected_floor = now_ms() + DEFAULT_TTL_MS;

    let token = fx.manager.create(NewSession::new("1")).await.unwrap();

    let claims = TokenCodec::verify_with_secret(&token, SECRET).unwrap();
    assert_eq!(claims.uid, "1");

    let record = fx.record(&token).await;
    assert_eq!(record["uid"], "1");
    assert!(record["expiresAt"].parse::<i64>().unwrap() >= expected_floor);

    let ttl = fx.pttl(&token).await;
    assert!(ttl > 7_198_000);
    assert!(ttl <= 7_200_000);

    fx.purge().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_extend_rescores_index() {
    let fx = Fixture::new("extend").await;
    let token = fx
        .manager
        .create(NewSession::new("1").with_ttl(Duration::from_secs(2)))
        .await
        .unwrap();

    let expected_floor = now_ms() + DEFAULT_TTL_MS;
    let new_expiry = fx.manager.extend(&token, None).await.unwrap();

    let record = fx.record(&token).await;
    assert!(record["expiresAt"].parse::<i64>().unwrap() >= expected_floor);
    assert!(fx.pttl(&token).await > 7_198_000);

    let entries = fx.index.entries().await.unwrap();
    assert_eq!(entries, vec![(format!("1:{}", token), new_expiry)]);

    assert!(matches!(
        fx.manager.extend("a.a.b", None).await,
        Err(SessionError::InvalidToken(_))
    ));

    fx.purge().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_get_failures() {
    let fx = Fixture::new("get").await;
    let token = fx
        .manager
        .create(NewSession::new("1").with_ip("192.168.1.1"))
        .await
        .unwrap();

    let session = fx.manager.get(&token).await.unwrap();
    assert_eq!(session.uid, "1");
    assert_eq!(session.ip.as_deref(), Some("192.168.1.1"));

    assert!(matches!(
        fx.manager.get("invalid token").await,
        Err(SessionError::MalformedToken)
    ));
    assert!(matches!(
        fx.manager.get("a.a.b").await,
        Err(SessionError::InvalidToken(_))
    ));

    let unknown = TokenCodec::new(TokenConfig::new(SECRET))
        .unwrap()
        .sign("1", now_ms())
        .unwrap();
    assert!(matches!(
        fx.manager.get(&unknown).await,
        Err(SessionError::UnknownToken)
    ));

    fx.purge().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_destroy_clears_all_structures() {
    let fx = Fixture::new("destroy").await;
    let token = fx.manager.create(NewSession::new("1")).await.unwrap();

    assert!(fx.manager.destroy(&token).await.unwrap());
    assert!(fx.user_set("1").await.is_empty());
    assert!(fx.list().await.is_empty());
    assert!(fx.record(&token).await.is_empty());

    assert!(!fx.manager.destroy(&token).await.unwrap());
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_destroy_user_leaves_other_users() {
    let fx = Fixture::new("destroy-user").await;
    let token1 = fx.manager.create(NewSession::new("1")).await.unwrap();
    fx.manager.create(NewSession::new("1")).await.unwrap();
    let token3 = fx.manager.create(NewSession::new("2")).await.unwrap();

    assert!(fx.manager.destroy_user("1").await.unwrap());

    assert!(fx.user_set("1").await.is_empty());
    assert_eq!(fx.list().await, vec![format!("2:{}", token3)]);
    assert!(fx.record(&token1).await.is_empty());

    assert!(!fx.manager.destroy_user("1").await.unwrap());

    fx.purge().await;
}

#[tokio::test]
#[ignore = "requires Redis"]
async fn test_cleanup() {
    let fx = Fixture::new("cleanup").await;

    fx.manager
        .create(NewSession::new("1").with_ttl(Duration::ZERO))
        .await
        .unwrap();
    let token2 = fx.manager.create(NewSession::new("1")).await.unwrap();

    assert_eq!(fx.manager.cleanup(false).await.unwrap(), 1);
    assert_eq!(fx.user_set("1").await, vec![token2]);

    assert_eq!(fx.manager.cleanup(true).await.unwrap(), 1);
    assert!(fx.index.stored_keys().await.unwrap().is_empty());
}
