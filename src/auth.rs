//! OAuth2 client-credentials token cache.
//!
//! [`TokenManager`] is built once by the composition root and shared behind an
//! `Arc`. Concurrent callers may both see a stale token and both refresh; the
//! token endpoint is idempotent, so the last refresh to finish wins. The lock
//! is never held across an `.await`.

use crate::error::ApiError;
use chrono::{DateTime, Duration, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

pub const TOKEN_PATH: &str = "/v1/security/oauth2/token";

/// Lifetime assumed when the token endpoint omits `expires_in`.
pub const DEFAULT_EXPIRES_IN_SECS: i64 = 1800;

/// Tokens are refreshed this long before they actually expire.
pub const REFRESH_MARGIN_SECS: i64 = 5 * 60;

pub const API_KEY_VAR: &str = "AMADEUS_API_KEY";
pub const API_SECRET_VAR: &str = "AMADEUS_API_SECRET";

#[derive(Clone, Default)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    /// Reads the API key pair from the environment. Missing values are logged,
    /// not fatal: the first API call reports them instead.
    pub fn from_env() -> Self {
        let read = |name: &str| match std::env::var(name) {
            Ok(value) if !value.trim().is_empty() => value.trim().to_string(),
            _ => {
                warn!("{} is not set; flight search will fail to authenticate", name);
                String::new()
            }
        };
        Self::new(read(API_KEY_VAR), read(API_SECRET_VAR))
    }

    pub fn is_configured(&self) -> bool {
        !self.client_id.is_empty() && !self.client_secret.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub value: String,
    pub expires_at: DateTime<Utc>,
}

impl AccessToken {
    /// A non-positive or unrepresentable `expires_in_secs` falls back to
    /// [`DEFAULT_EXPIRES_IN_SECS`].
    pub fn issued(value: impl Into<String>, expires_in_secs: i64, issued_at: DateTime<Utc>) -> Self {
        let expires_at = Some(expires_in_secs)
            .filter(|secs| *secs > 0)
            .and_then(Duration::try_seconds)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .unwrap_or_else(|| {
                warn!(
                    "Unusable token lifetime {}s, assuming {}s",
                    expires_in_secs, DEFAULT_EXPIRES_IN_SECS
                );
                issued_at + Duration::seconds(DEFAULT_EXPIRES_IN_SECS)
            });
        Self {
            value: value.into(),
            expires_at,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn needs_refresh_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at
            .checked_sub_signed(Duration::seconds(REFRESH_MARGIN_SECS))
            .map_or(true, |refresh_at| now >= refresh_at)
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<i64>,
}

pub struct TokenManager {
    http: Client,
    token_url: String,
    credentials: Credentials,
    cached: Mutex<Option<AccessToken>>,
}

impl TokenManager {
    pub fn new(http: Client, base_url: &str, credentials: Credentials) -> Self {
        Self {
            http,
            token_url: format!("{}{}", base_url.trim_end_matches('/'), TOKEN_PATH),
            credentials,
            cached: Mutex::new(None),
        }
    }

    /// Returns a token that is not due for refresh, exchanging credentials
    /// when needed. Failures are not retried here.
    pub async fn get_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.current() {
            if !token.needs_refresh_at(Utc::now()) {
                return Ok(token.value);
            }
            debug!("Cached access token is due for refresh");
        }

        let fresh = self.exchange().await?;
        let value = fresh.value.clone();
        *self.lock() = Some(fresh);
        Ok(value)
    }

    /// Drops the cached token after the API rejected it.
    pub fn invalidate(&self) {
        if self.lock().take().is_some() {
            info!("Access token invalidated");
        }
    }

    /// Snapshot of the cached token, if any.
    pub fn current(&self) -> Option<AccessToken> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Option<AccessToken>> {
        self.cached.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn exchange(&self) -> Result<AccessToken, ApiError> {
        if !self.credentials.is_configured() {
            return Err(ApiError::authentication(
                format!("{} / {} are not configured", API_KEY_VAR, API_SECRET_VAR),
                None,
            ));
        }

        let issued_at = Utc::now();
        let response = self
            .http
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.credentials.client_id.as_str()),
                ("client_secret", self.credentials.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| ApiError::Authentication {
                message: "token request failed".to_string(),
                status: None,
                source: Some(e),
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| ApiError::Authentication {
            message: "token response could not be read".to_string(),
            status: Some(status.as_u16()),
            source: Some(e),
        })?;

        if !status.is_success() {
            warn!("Token endpoint returned {}: {}", status, body);
            let description = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error_description")?.as_str().map(str::to_string))
                .unwrap_or_else(|| format!("token endpoint returned {}", status));
            return Err(ApiError::authentication(description, Some(status.as_u16())));
        }

        let parsed: TokenResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::authentication(format!("malformed token response: {}", e), None)
        })?;

        let token = AccessToken::issued(
            parsed.access_token,
            parsed.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS),
            issued_at,
        );
        info!("Obtained access token valid until {}", token.expires_at);
        Ok(token)
    }
}
