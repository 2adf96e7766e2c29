//! OAuth token cache for the SaluteSpeech API.
//!
//! Tokens are obtained via the client-credentials grant and reused until
//! they are close to expiry. The cache is shared by every in-flight
//! request; refreshes are serialized so the provider never sees two
//! concurrent exchanges from one process.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use uuid::Uuid;

/// Tokens within this margin of expiry are refreshed eagerly.
pub const REFRESH_MARGIN_MS: i64 = 60_000;

/// A bearer token with its absolute expiry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    /// Opaque bearer credential.
    pub token: String,
    /// Absolute expiry in epoch milliseconds, as reported by the provider.
    pub expires_at: i64,
}

impl AccessToken {
    /// True if the token is still usable at `now_ms` with the safety margin.
    pub fn is_fresh(&self, now_ms: i64) -> bool {
        self.expires_at - now_ms > REFRESH_MARGIN_MS
    }
}

/// Errors from the token exchange
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("token exchange request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("token endpoint returned {0}")]
    Rejected(StatusCode),
}

/// Performs one client-credentials exchange.
///
/// Split out as a trait so the cache logic can be tested with a
/// counting fake instead of a live OAuth endpoint.
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    async fn exchange(&self) -> Result<AccessToken, AuthError>;
}

/// Wire format of the OAuth response
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_at: i64,
}

/// Client-credentials exchange against the SaluteSpeech OAuth endpoint
pub struct OAuthExchanger {
    client: reqwest::Client,
    oauth_url: String,
    auth_key: String,
    scope: String,
}

impl OAuthExchanger {
    pub fn new(
        oauth_url: impl Into<String>,
        auth_key: impl Into<String>,
        scope: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            oauth_url: oauth_url.into(),
            auth_key: auth_key.into(),
            scope: scope.into(),
        }
    }
}

#[async_trait]
impl TokenExchanger for OAuthExchanger {
    async fn exchange(&self) -> Result<AccessToken, AuthError> {
        let response = self
            .client
            .post(&self.oauth_url)
            .header("Accept", "application/json")
            .header("RqUID", Uuid::new_v4().to_string())
            .header("Authorization", format!("Basic {}", self.auth_key))
            .form(&[("scope", self.scope.as_str())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AuthError::Rejected(response.status()));
        }

        let body: TokenResponse = response.json().await?;

        info!("obtained new access token");

        Ok(AccessToken {
            token: body.access_token,
            expires_at: body.expires_at,
        })
    }
}

/// Process-wide token cache.
///
/// The mutex is held across the refresh await, so concurrent callers
/// queue behind a single in-flight exchange and then observe the
/// freshly cached token instead of issuing their own.
pub struct TokenCache {
    exchanger: Arc<dyn TokenExchanger>,
    cached: tokio::sync::Mutex<Option<AccessToken>>,
}

impl TokenCache {
    pub fn new(exchanger: Arc<dyn TokenExchanger>) -> Self {
        Self {
            exchanger,
            cached: tokio::sync::Mutex::new(None),
        }
    }

    /// Return a token valid for at least the refresh margin.
    ///
    /// A fresh cached token is returned without any network call. On
    /// exchange failure the cache is left untouched, so the next caller
    /// retries the exchange.
    pub async fn get_valid_token(&self) -> Result<AccessToken, AuthError> {
        let mut cached = self.cached.lock().await;

        let now_ms = Utc::now().timestamp_millis();
        if let Some(token) = cached.as_ref() {
            if token.is_fresh(now_ms) {
                return Ok(token.clone());
            }
        }

        let fresh = self.exchanger.exchange().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }
}
