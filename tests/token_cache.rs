//! Token cache integration tests
//!
//! Exercise reuse, expiry-driven refresh, refresh serialization under
//! concurrency, and failure handling with fake exchangers.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;

use protokol::adapters::token::{AccessToken, AuthError, TokenCache, TokenExchanger};

/// Exchanger that counts calls and issues tokens with a fixed ttl
struct CountingExchanger {
    calls: AtomicUsize,
    delay: Duration,
    ttl_ms: i64,
}

impl CountingExchanger {
    fn new(ttl_ms: i64) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay: Duration::ZERO,
            ttl_ms,
        }
    }

    fn slow(ttl_ms: i64, delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
            ttl_ms,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenExchanger for CountingExchanger {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        tokio::time::sleep(self.delay).await;
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(AccessToken {
            token: format!("token-{}", n),
            expires_at: Utc::now().timestamp_millis() + self.ttl_ms,
        })
    }
}

/// Exchanger that rejects the first `failures` calls
struct FlakyExchanger {
    calls: AtomicUsize,
    failures: usize,
}

#[async_trait]
impl TokenExchanger for FlakyExchanger {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        if n < self.failures {
            return Err(AuthError::Rejected(StatusCode::UNAUTHORIZED));
        }
        Ok(AccessToken {
            token: "recovered".to_string(),
            expires_at: Utc::now().timestamp_millis() + 3_600_000,
        })
    }
}

#[tokio::test]
async fn test_fresh_token_is_reused_without_exchange() {
    let exchanger = Arc::new(CountingExchanger::new(3_600_000));
    let cache = TokenCache::new(exchanger.clone());

    let first = cache.get_valid_token().await.unwrap();
    let second = cache.get_valid_token().await.unwrap();

    // One network call; the second caller got the cached token unchanged
    assert_eq!(exchanger.calls(), 1);
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_token_inside_safety_margin_triggers_refresh() {
    // 30s ttl is inside the 60s refresh margin, so every call refreshes
    let exchanger = Arc::new(CountingExchanger::new(30_000));
    let cache = TokenCache::new(exchanger.clone());

    let first = cache.get_valid_token().await.unwrap();
    let second = cache.get_valid_token().await.unwrap();

    assert_eq!(exchanger.calls(), 2);
    assert_ne!(first.token, second.token);
}

#[tokio::test]
async fn test_concurrent_callers_share_one_refresh() {
    let exchanger = Arc::new(CountingExchanger::slow(
        3_600_000,
        Duration::from_millis(100),
    ));
    let cache = Arc::new(TokenCache::new(exchanger.clone()));

    let mut handles = Vec::new();
    for _ in 0..10 {
        let cache = Arc::clone(&cache);
        handles.push(tokio::spawn(async move {
            cache.get_valid_token().await.unwrap()
        }));
    }

    let mut tokens = Vec::new();
    for handle in handles {
        tokens.push(handle.await.unwrap());
    }

    // Exactly one exchange; every caller received its result
    assert_eq!(exchanger.calls(), 1);
    assert!(tokens.iter().all(|t| t == &tokens[0]));
}

#[tokio::test]
async fn test_failed_exchange_does_not_poison_cache() {
    let exchanger = Arc::new(FlakyExchanger {
        calls: AtomicUsize::new(0),
        failures: 1,
    });
    let cache = TokenCache::new(exchanger.clone());

    let err = cache.get_valid_token().await.unwrap_err();
    assert!(matches!(err, AuthError::Rejected(code) if code == StatusCode::UNAUTHORIZED));

    // The failure was not cached; the next caller retries and succeeds
    let token = cache.get_valid_token().await.unwrap();
    assert_eq!(token.token, "recovered");
    assert_eq!(exchanger.calls.load(Ordering::SeqCst), 2);
}
