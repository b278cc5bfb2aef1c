// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Local account and session routes.
//!
//! The refresh token travels only in an HttpOnly cookie; the access token
//! is returned in the JSON body and sent back as a bearer header.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::middleware::AuthUser;
use crate::models::{AuthResult, Profile, UserInfo};
use crate::services::auth::{LoginRequest, ProfileUpdateRequest, SignupRequest};
use crate::AppState;

/// Name of the refresh token cookie.
pub const REFRESH_COOKIE: &str = "fitcheck_refresh";

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/token/refresh", post(refresh))
}

/// Body returned by every flow that can sign a user in.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    /// Unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token_expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signup_ticket: Option<String>,
    pub user_info: UserInfo,
}

/// Build the response body and refresh cookie for a flow result.
pub(crate) fn session_response(
    jar: CookieJar,
    config: &Config,
    result: AuthResult,
) -> (CookieJar, Json<AuthResponse>) {
    let AuthResult {
        tokens,
        signup_ticket,
        user_info,
    } = result;

    let (jar, access_token, access_token_expires_at) = match tokens {
        Some(pair) => (
            jar.add(refresh_cookie(config, pair.refresh_token)),
            Some(pair.access_token),
            Some(pair.access_expires_at),
        ),
        None => (jar, None, None),
    };

    (
        jar,
        Json(AuthResponse {
            access_token,
            access_token_expires_at,
            signup_ticket,
            user_info,
        }),
    )
}

fn refresh_cookie(config: &Config, token: String) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(config.cookie_secure)
        .same_site(config.cookie_same_site)
        .path("/")
        .max_age(time::Duration::seconds(config.refresh_token_ttl_secs))
        .build()
}

/// Removal must repeat the attributes the cookie was set with.
fn refresh_cookie_removal(config: &Config) -> Cookie<'static> {
    refresh_cookie(config, String::new())
}

/// Register a local account.
async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<SignupRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let result = state.auth.signup(request).await?;
    let (jar, body) = session_response(jar, &state.config, result);
    Ok((StatusCode::CREATED, jar, body))
}

async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(request): Json<LoginRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let result = state.auth.login(request).await?;
    Ok(session_response(jar, &state.config, result))
}

/// Rotate the refresh token held in the cookie.
async fn refresh(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let presented = jar.get(REFRESH_COOKIE).map(|c| c.value().to_string());
    let result = state.auth.refresh(presented.as_deref()).await?;
    Ok(session_response(jar, &state.config, result))
}

/// Revoke the session. The cookie is cleared even when nothing was revoked.
pub(crate) async fn logout(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    jar: CookieJar,
) -> (CookieJar, Response) {
    let jar = jar.remove(refresh_cookie_removal(&state.config));

    let response = match state.auth.logout(user.identity_id).await {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => e.into_response(),
    };

    (jar, response)
}

pub(crate) async fn me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UserInfo>> {
    Ok(Json(state.auth.me(user.identity_id).await?))
}

pub(crate) async fn update_profile(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<ProfileUpdateRequest>,
) -> Result<Json<Profile>> {
    let profile = state.auth.update_profile(user.identity_id, request).await?;
    Ok(Json(profile))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum_extra::extract::cookie::SameSite;

    #[test]
    fn test_refresh_cookie_attributes() {
        let config = Config {
            cookie_secure: true,
            cookie_same_site: SameSite::Strict,
            ..Config::default()
        };

        let cookie = refresh_cookie(&config, "token".to_string()).to_string();
        assert!(cookie.starts_with("fitcheck_refresh=token"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Strict"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Max-Age=1209600"));
    }

    #[test]
    fn test_pending_signup_has_no_cookie_or_token() {
        let result = AuthResult::pending_signup(
            "New".to_string(),
            "new@example.com".to_string(),
            "ticket".to_string(),
        );

        let (jar, Json(body)) = session_response(CookieJar::new(), &Config::default(), result);
        assert!(jar.get(REFRESH_COOKIE).is_none());
        assert!(body.access_token.is_none());
        assert_eq!(body.signup_ticket.as_deref(), Some("ticket"));
        assert!(body.user_info.is_new_user);
    }
}
