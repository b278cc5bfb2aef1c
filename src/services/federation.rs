// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! External OAuth identity provider.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization code → provider access token exchange
//! - Profile fetch (provider user id, email, display name)
//! - Parking the profile of a first-time user until signup completes

use crate::config::Config;
use crate::db::CacheStore;
use crate::error::AppError;
use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Identity as reported by the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub email: String,
    pub display_name: String,
}

#[async_trait]
pub trait FederationProvider: Send + Sync {
    /// Short provider name stored on federated credentials.
    fn name(&self) -> &str;

    /// URL the browser is sent to for consent.
    fn authorize_url(&self, state: &str) -> String;

    /// Exchange an authorization code for a provider access token.
    async fn exchange_code(&self, code: &str) -> Result<String, AppError>;

    async fn fetch_profile(&self, provider_token: &str) -> Result<ProviderProfile, AppError>;
}

/// Authorization-code client for a Kakao-style provider.
#[derive(Clone)]
pub struct OAuthClient {
    http: reqwest::Client,
    provider: String,
    client_id: String,
    client_secret: Option<String>,
    redirect_uri: String,
    authorize_url: String,
    token_url: String,
    profile_url: String,
}

impl OAuthClient {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("failed building OAuth HTTP client")?;

        Ok(Self {
            http,
            provider: "kakao".to_string(),
            client_id: config.oauth_client_id.clone(),
            client_secret: config.oauth_client_secret.clone(),
            redirect_uri: config.oauth_redirect_uri.clone(),
            authorize_url: config.oauth_authorize_url.clone(),
            token_url: config.oauth_token_url.clone(),
            profile_url: config.oauth_profile_url.clone(),
        })
    }
}

#[async_trait]
impl FederationProvider for OAuthClient {
    fn name(&self) -> &str {
        &self.provider
    }

    fn authorize_url(&self, state: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&state={}",
            self.authorize_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(state)
        )
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        let mut form = vec![
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
        ];
        if let Some(secret) = &self.client_secret {
            form.push(("client_secret", secret.as_str()));
        }

        let response = self
            .http
            .post(&self.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| transport_error("token exchange", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "Provider rejected authorization code");
            return Err(AppError::TokenExchangeFailed);
        }

        let token: TokenResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                return transport_error("token exchange", e);
            }
            tracing::warn!(error = %e, "Malformed token exchange response");
            AppError::TokenExchangeFailed
        })?;

        Ok(token.access_token)
    }

    async fn fetch_profile(&self, provider_token: &str) -> Result<ProviderProfile, AppError> {
        let response = self
            .http
            .get(&self.profile_url)
            .bearer_auth(provider_token)
            .send()
            .await
            .map_err(|e| transport_error("profile fetch", e))?;

        if !response.status().is_success() {
            tracing::warn!(status = %response.status(), "Provider profile request failed");
            return Err(AppError::ProfileFetchFailed);
        }

        let body: ProfileResponse = response.json().await.map_err(|e| {
            if e.is_timeout() {
                return transport_error("profile fetch", e);
            }
            tracing::warn!(error = %e, "Malformed provider profile");
            AppError::ProfileFetchFailed
        })?;

        body.into_profile().ok_or_else(|| {
            tracing::warn!("Provider profile is missing email or id");
            AppError::ProfileFetchFailed
        })
    }
}

/// Timeouts and connection failures mean the provider is unreachable.
fn transport_error(operation: &str, err: reqwest::Error) -> AppError {
    tracing::warn!(
        operation,
        timeout = err.is_timeout(),
        error = %err,
        "Identity provider unreachable"
    );
    AppError::ProviderUnavailable
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct ProfileResponse {
    id: serde_json::Value,
    #[serde(rename = "kakao_account", default)]
    account: Option<ProviderAccount>,
}

#[derive(Debug, Deserialize)]
struct ProviderAccount {
    email: Option<String>,
    #[serde(default)]
    profile: Option<ProviderAccountProfile>,
}

#[derive(Debug, Deserialize)]
struct ProviderAccountProfile {
    nickname: Option<String>,
}

impl ProfileResponse {
    fn into_profile(self) -> Option<ProviderProfile> {
        let provider_id = match self.id {
            serde_json::Value::Number(n) => n.to_string(),
            serde_json::Value::String(s) if !s.is_empty() => s,
            _ => return None,
        };
        let account = self.account?;
        let email = account.email.filter(|e| !e.trim().is_empty())?;
        let display_name = account
            .profile
            .and_then(|p| p.nickname)
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| email.split('@').next().unwrap_or_default().to_string());

        Some(ProviderProfile {
            provider_id,
            email,
            display_name,
        })
    }
}

// ─── Pending signups ─────────────────────────────────────────

const PENDING_PREFIX: &str = "oauth:pending:";

/// Provider profiles of first-time users, keyed by an opaque single-use ticket.
///
/// The ticket is returned to the client in place of tokens and must be
/// presented to complete signup, so the provider id and email can never be
/// supplied by the client directly.
#[derive(Clone)]
pub struct PendingSignups {
    cache: Arc<dyn CacheStore>,
    ttl: Duration,
}

impl PendingSignups {
    pub fn new(cache: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// Store `profile` and return the ticket that redeems it.
    pub async fn park(&self, profile: &ProviderProfile) -> Result<String, AppError> {
        let ticket = uuid::Uuid::new_v4().simple().to_string();
        let value = serde_json::to_string(profile)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("encode pending signup: {}", e)))?;

        self.cache
            .set(&pending_key(&ticket), &value, Some(self.ttl))
            .await?;
        Ok(ticket)
    }

    pub async fn peek(&self, ticket: &str) -> Result<Option<ProviderProfile>, AppError> {
        let Some(value) = self.cache.get(&pending_key(ticket)).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&value) {
            Ok(profile) => Ok(Some(profile)),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable pending signup");
                self.cache.del(&pending_key(ticket)).await?;
                Ok(None)
            }
        }
    }

    pub async fn discard(&self, ticket: &str) -> Result<(), AppError> {
        self.cache.del(&pending_key(ticket)).await?;
        Ok(())
    }
}

fn pending_key(ticket: &str) -> String {
    format!("{PENDING_PREFIX}{ticket}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryCache;

    #[test]
    fn test_authorize_url() {
        let config = Config {
            oauth_client_id: "client id".to_string(),
            oauth_redirect_uri: "http://localhost:5173/cb".to_string(),
            oauth_authorize_url: "https://provider.test/authorize".to_string(),
            ..Config::default()
        };
        let client = OAuthClient::new(&config).unwrap();

        let url = client.authorize_url("abc|123");
        assert_eq!(
            url,
            "https://provider.test/authorize?client_id=client%20id\
             &redirect_uri=http%3A%2F%2Flocalhost%3A5173%2Fcb\
             &response_type=code&state=abc%7C123"
        );
    }

    #[test]
    fn test_profile_parsing() {
        let body: ProfileResponse = serde_json::from_value(serde_json::json!({
            "id": 12345,
            "kakao_account": {
                "email": "user@example.com",
                "profile": { "nickname": "Runner" }
            }
        }))
        .unwrap();

        assert_eq!(
            body.into_profile(),
            Some(ProviderProfile {
                provider_id: "12345".to_string(),
                email: "user@example.com".to_string(),
                display_name: "Runner".to_string(),
            })
        );
    }

    #[test]
    fn test_profile_without_email_is_rejected() {
        let body: ProfileResponse = serde_json::from_value(serde_json::json!({
            "id": 12345,
            "kakao_account": { "profile": { "nickname": "Runner" } }
        }))
        .unwrap();
        assert_eq!(body.into_profile(), None);
    }

    #[test]
    fn test_display_name_falls_back_to_email_local_part() {
        let body: ProfileResponse = serde_json::from_value(serde_json::json!({
            "id": "abc",
            "kakao_account": { "email": "jo@example.com" }
        }))
        .unwrap();
        assert_eq!(body.into_profile().unwrap().display_name, "jo");
    }

    #[tokio::test]
    async fn test_pending_signup_ticket() {
        let pending = PendingSignups::new(Arc::new(MemoryCache::new()), Duration::from_secs(600));
        let profile = ProviderProfile {
            provider_id: "1".to_string(),
            email: "a@example.com".to_string(),
            display_name: "A".to_string(),
        };

        let ticket = pending.park(&profile).await.unwrap();
        assert_eq!(pending.peek(&ticket).await.unwrap(), Some(profile));
        assert_eq!(pending.peek("unknown").await.unwrap(), None);

        pending.discard(&ticket).await.unwrap();
        assert_eq!(pending.peek(&ticket).await.unwrap(), None);
    }
}
