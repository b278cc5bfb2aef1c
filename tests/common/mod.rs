// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use fitcheck_auth::config::Config;
use fitcheck_auth::db::{MemoryCache, MemoryLedger, MemoryStore};
use fitcheck_auth::error::AppError;
use fitcheck_auth::routes::create_router;
use fitcheck_auth::services::{
    Argon2Hasher, AuthComponents, AuthService, FederationProvider, PendingSignups,
    ProviderProfile, SmsGateway, TokenService, VerificationPolicy, VerificationService,
};
use fitcheck_auth::AppState;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

pub const REFRESH_COOKIE: &str = "fitcheck_refresh";

// ─── Fakes ───────────────────────────────────────────────────

/// Identity provider that answers from a canned profile.
#[derive(Default)]
pub struct FakeProvider {
    profile: Mutex<Option<ProviderProfile>>,
    failure: Mutex<Option<fn() -> AppError>>,
}

impl FakeProvider {
    pub fn set_profile(&self, provider_id: &str, email: &str, display_name: &str) {
        *self.profile.lock().unwrap() = Some(ProviderProfile {
            provider_id: provider_id.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
        });
    }

    /// Make the next exchanges fail with the given error.
    pub fn fail_with(&self, error: fn() -> AppError) {
        *self.failure.lock().unwrap() = Some(error);
    }
}

#[async_trait]
impl FederationProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn authorize_url(&self, state: &str) -> String {
        format!("https://provider.test/authorize?state={state}")
    }

    async fn exchange_code(&self, code: &str) -> Result<String, AppError> {
        if let Some(error) = *self.failure.lock().unwrap() {
            return Err(error());
        }
        Ok(format!("provider-token-{code}"))
    }

    async fn fetch_profile(&self, _provider_token: &str) -> Result<ProviderProfile, AppError> {
        self.profile
            .lock()
            .unwrap()
            .clone()
            .ok_or(AppError::ProfileFetchFailed)
    }
}

/// SMS gateway that records messages instead of sending them.
#[derive(Default)]
pub struct RecordingSms {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<bool>,
}

impl RecordingSms {
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Six-digit code from the most recent message to `phone`.
    pub fn last_code(&self, phone: &str) -> Option<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(to, _)| to == phone)
            .map(|(_, message)| {
                message
                    .chars()
                    .filter(|c| c.is_ascii_digit())
                    .collect::<String>()
            })
            .map(|digits| digits[digits.len() - 6..].to_string())
    }
}

#[async_trait]
impl SmsGateway for RecordingSms {
    async fn send(&self, phone: &str, message: &str) -> Result<(), AppError> {
        if *self.failing.lock().unwrap() {
            return Err(AppError::SmsSendFailed);
        }
        self.sent
            .lock()
            .unwrap()
            .push((phone.to_string(), message.to_string()));
        Ok(())
    }
}

// ─── Test app ────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub store: Arc<MemoryStore>,
    pub ledger: Arc<MemoryLedger>,
    pub cache: Arc<MemoryCache>,
    pub provider: Arc<FakeProvider>,
    pub sms: Arc<RecordingSms>,
}

impl TestApp {
    /// Send one request through a clone of the router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Create a test app with in-memory backends and fake integrations.
pub fn create_test_app() -> TestApp {
    create_test_app_with_config(Config::default())
}

pub fn create_test_app_with_config(config: Config) -> TestApp {
    let store = Arc::new(MemoryStore::with_default_body_types());
    let ledger = Arc::new(MemoryLedger::new());
    let cache = Arc::new(MemoryCache::new());
    let provider = Arc::new(FakeProvider::default());
    let sms = Arc::new(RecordingSms::default());
    let tokens = TokenService::from_config(&config);

    let auth = AuthService::new(AuthComponents {
        store: store.clone(),
        ledger: ledger.clone(),
        tokens: tokens.clone(),
        // Cheap parameters keep debug-build tests fast.
        hasher: Arc::new(Argon2Hasher::with_params(1024, 1, 1).unwrap()),
        verification: VerificationService::new(
            cache.clone(),
            VerificationPolicy::from_config(&config),
        ),
        federation: provider.clone(),
        pending: PendingSignups::new(
            cache.clone(),
            Duration::from_secs(config.pending_signup_ttl_secs),
        ),
        sms: sms.clone(),
    });

    let state = Arc::new(AppState {
        config,
        tokens,
        auth,
    });

    TestApp {
        router: create_router(state.clone()),
        state,
        store,
        ledger,
        cache,
        provider,
        sms,
    }
}

// ─── Request helpers ─────────────────────────────────────────

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn bearer_request(method: &str, uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap()
}

pub fn refresh_request(refresh_token: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/token/refresh")
        .header(header::COOKIE, format!("{REFRESH_COOKIE}={refresh_token}"))
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn set_cookie_headers(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

/// Full `Set-Cookie` header for the refresh cookie, if any.
pub fn find_refresh_cookie(response: &Response<Body>) -> Option<String> {
    set_cookie_headers(response)
        .into_iter()
        .find(|value| value.starts_with(&format!("{REFRESH_COOKIE}=")))
}

/// Refresh token value from the response's `Set-Cookie`.
pub fn refresh_token_from(response: &Response<Body>) -> String {
    let cookie = find_refresh_cookie(response).expect("missing refresh cookie");
    cookie[REFRESH_COOKIE.len() + 1..]
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

pub fn signup_body(email: &str, phone: &str, password: &str) -> Value {
    json!({
        "email": email,
        "password": password,
        "name": "Test User",
        "phone": phone,
        "height": 175.0,
        "weight": 70.0,
        "gender": "MALE",
        "bodyTypeId": 2,
        "consents": { "termsOfService": true, "privacyPolicy": true, "marketing": false }
    })
}

/// Sign up a local account, returning `(access_token, refresh_token)`.
pub async fn signup(app: &TestApp, email: &str, phone: &str, password: &str) -> (String, String) {
    let response = app
        .send(json_request("POST", "/signup", signup_body(email, phone, password)))
        .await;
    assert_eq!(response.status(), 201, "signup failed");

    let refresh = refresh_token_from(&response);
    let body = body_json(response).await;
    (body["accessToken"].as_str().unwrap().to_string(), refresh)
}
