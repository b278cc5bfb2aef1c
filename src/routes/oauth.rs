// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth login and federated signup routes.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use axum_extra::extract::cookie::CookieJar;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::routes::auth::{session_response, AuthResponse};
use crate::services::auth::OAuthSignupRequest;
use crate::time_utils::unix_now_millis;
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed `state` stays acceptable.
const STATE_MAX_AGE_MS: i64 = 10 * 60 * 1000;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/oauth/authorize-url", get(authorize_url))
        .route("/oauth/callback", get(callback))
        .route("/oauth/signup/complete", post(complete_signup))
}

#[derive(Serialize)]
pub struct AuthorizeUrlResponse {
    pub url: String,
}

/// Provider consent URL with a freshly signed `state`.
async fn authorize_url(State(state): State<Arc<AppState>>) -> Result<Json<AuthorizeUrlResponse>> {
    let oauth_state = sign_state(&state.config.oauth_state_key, unix_now_millis())?;
    let url = state.auth.authorize_url(&oauth_state);

    tracing::info!("Issued OAuth authorization URL");
    Ok(Json(AuthorizeUrlResponse { url }))
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Provider redirect target. Signs in known users; returns a signup ticket
/// for new ones.
async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from provider");
        return Err(AppError::BadRequest(format!("authorization denied: {error}")));
    }

    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("missing state".to_string()))?;
    if !verify_state(&oauth_state, &state.config.oauth_state_key, unix_now_millis()) {
        return Err(AppError::BadRequest("invalid or expired state".to_string()));
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or_else(|| AppError::BadRequest("missing authorization code".to_string()))?;

    let result = state.auth.oauth_callback(&code).await?;
    Ok(session_response(jar, &state.config, result))
}

async fn complete_signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<OAuthSignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let result = state.auth.complete_oauth_signup(request).await?;
    let (jar, body) = session_response(jar, &state.config, result);
    Ok((StatusCode::CREATED, jar, body))
}

// ─── State signing ───────────────────────────────────────────

/// Build `base64url("nonce|timestamp_hex|signature_hex")`.
pub fn sign_state(secret: &[u8], now_ms: i64) -> Result<String> {
    let nonce = uuid::Uuid::new_v4().simple().to_string();
    let payload = format!("{}|{:x}", nonce, now_ms);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Check signature and age of a `state` produced by [`sign_state`].
pub fn verify_state(state: &str, secret: &[u8], now_ms: i64) -> bool {
    let Some((payload, timestamp, signature)) = split_state(state) else {
        return false;
    };

    let Ok(mut mac) = HmacSha256::new_from_slice(secret) else {
        return false;
    };
    mac.update(payload.as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return false;
    }

    let age = now_ms - timestamp;
    if !(0..=STATE_MAX_AGE_MS).contains(&age) {
        tracing::warn!(age_ms = age, "OAuth state outside accepted age");
        return false;
    }

    true
}

fn split_state(state: &str) -> Option<(String, i64, Vec<u8>)> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    let &[nonce, timestamp_hex, signature_hex] = parts.as_slice() else {
        return None;
    };

    let timestamp = i64::from_str_radix(timestamp_hex, 16).ok()?;
    let signature = hex::decode(signature_hex).ok()?;
    Some((format!("{}|{}", nonce, timestamp_hex), timestamp, signature))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"secret_key";
    const NOW: i64 = 1_700_000_000_000;

    #[test]
    fn test_state_roundtrip() {
        let state = sign_state(SECRET, NOW).unwrap();
        assert!(verify_state(&state, SECRET, NOW));
        assert!(verify_state(&state, SECRET, NOW + STATE_MAX_AGE_MS));
    }

    #[test]
    fn test_state_expired() {
        let state = sign_state(SECRET, NOW).unwrap();
        assert!(!verify_state(&state, SECRET, NOW + STATE_MAX_AGE_MS + 1));
    }

    #[test]
    fn test_state_from_the_future() {
        let state = sign_state(SECRET, NOW + 60_000).unwrap();
        assert!(!verify_state(&state, SECRET, NOW));
    }

    #[test]
    fn test_state_wrong_secret() {
        let state = sign_state(SECRET, NOW).unwrap();
        assert!(!verify_state(&state, b"wrong_key", NOW));
    }

    #[test]
    fn test_state_tampered_timestamp() {
        let state = sign_state(SECRET, NOW).unwrap();
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&state).unwrap()).unwrap();
        let parts: Vec<&str> = decoded.splitn(3, '|').collect();

        let forged = format!("{}|{:x}|{}", parts[0], NOW + 1, parts[2]);
        let forged = URL_SAFE_NO_PAD.encode(forged.as_bytes());
        assert!(!verify_state(&forged, SECRET, NOW + 1));
    }

    #[test]
    fn test_state_malformed() {
        assert!(!verify_state("%%%", SECRET, NOW));
        let encoded = URL_SAFE_NO_PAD.encode("invalid|format");
        assert!(!verify_state(&encoded, SECRET, NOW));
    }
}
