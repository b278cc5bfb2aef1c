// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth callback and federated signup tests.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use fitcheck_auth::error::AppError;
use fitcheck_auth::routes::oauth::sign_state;
use fitcheck_auth::time_utils::unix_now_millis;
use serde_json::{json, Value};

mod common;

use common::{
    bearer_request, body_json, create_test_app, find_refresh_cookie, json_request, signup, TestApp,
};

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn valid_state(app: &TestApp) -> String {
    sign_state(&app.state.config.oauth_state_key, unix_now_millis()).unwrap()
}

fn complete_body(ticket: &str, phone: &str) -> Value {
    json!({
        "signupTicket": ticket,
        "phone": phone,
        "height": 165.0,
        "weight": 55.0,
        "gender": "FEMALE",
        "bodyTypeId": 1,
        "consents": { "termsOfService": true, "privacyPolicy": true, "marketing": true }
    })
}

/// Run the callback for a new provider user and return the signup ticket.
async fn pending_ticket(app: &TestApp) -> String {
    app.provider
        .set_profile("kk-1001", "Fed@Example.com", "Federated User");
    let state = valid_state(app);
    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={state}")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await["signupTicket"]
        .as_str()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_authorize_url_carries_verifiable_state() {
    let app = create_test_app();

    let response = app.send(get("/oauth/authorize-url")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let url = body_json(response).await["url"].as_str().unwrap().to_string();

    let state = url.split("state=").nth(1).expect("state parameter");
    assert!(fitcheck_auth::routes::oauth::verify_state(
        state,
        &app.state.config.oauth_state_key,
        unix_now_millis()
    ));
}

#[tokio::test]
async fn test_callback_rejects_bad_state() {
    let app = create_test_app();
    app.provider
        .set_profile("kk-1001", "fed@example.com", "Federated User");

    let response = app.send(get("/oauth/callback?code=abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .send(get("/oauth/callback?code=abc&state=bm90LWEtc3RhdGU"))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let forged = sign_state(b"some-other-key", unix_now_millis()).unwrap();
    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={forged}")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_callback_provider_error() {
    let app = create_test_app();
    let state = valid_state(&app);

    let response = app
        .send(get(&format!(
            "/oauth/callback?error=access_denied&state={state}"
        )))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_callback_new_user_gets_ticket_only() {
    let app = create_test_app();
    app.provider
        .set_profile("kk-1001", "Fed@Example.com", "Federated User");
    let state = valid_state(&app);

    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={state}")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(find_refresh_cookie(&response).is_none());

    let body = body_json(response).await;
    assert!(body.get("accessToken").is_none());
    assert!(body["signupTicket"].as_str().is_some());
    assert_eq!(body["userInfo"]["isNewUser"], true);
    assert_eq!(body["userInfo"]["email"], "fed@example.com");
    assert_eq!(body["userInfo"]["name"], "Federated User");

    assert_eq!(app.store.row_counts().await.identities, 0);
    assert!(app.ledger.is_empty());
}

#[tokio::test]
async fn test_complete_signup_then_ticket_is_spent() {
    let app = create_test_app();
    let ticket = pending_ticket(&app).await;

    let response = app
        .send(json_request(
            "POST",
            "/oauth/signup/complete",
            complete_body(&ticket, "010-5555-6666"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    assert!(find_refresh_cookie(&response).is_some());

    let body = body_json(response).await;
    let access = body["accessToken"].as_str().unwrap().to_string();
    assert_eq!(body["userInfo"]["email"], "fed@example.com");
    assert_eq!(body["userInfo"]["isNewUser"], false);

    let counts = app.store.row_counts().await;
    assert_eq!(
        (counts.identities, counts.credentials, counts.profiles),
        (1, 1, 1)
    );

    let response = app.send(bearer_request("GET", "/me", &access)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .send(json_request(
            "POST",
            "/oauth/signup/complete",
            complete_body(&ticket, "010-7777-8888"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");
    assert_eq!(app.store.row_counts().await.identities, 1);
}

#[tokio::test]
async fn test_complete_signup_unknown_ticket() {
    let app = create_test_app();

    let response = app
        .send(json_request(
            "POST",
            "/oauth/signup/complete",
            complete_body("never-issued", "010-5555-6666"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn test_complete_signup_duplicate_phone_keeps_ticket() {
    let app = create_test_app();
    signup(&app, "local@example.com", "010-5555-6666", "password123").await;
    let ticket = pending_ticket(&app).await;

    let response = app
        .send(json_request(
            "POST",
            "/oauth/signup/complete",
            complete_body(&ticket, "01055556666"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "DUPLICATE_PHONE");

    // The ticket survives a failed attempt.
    let response = app
        .send(json_request(
            "POST",
            "/oauth/signup/complete",
            complete_body(&ticket, "010-7777-8888"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn test_callback_existing_user_signs_in() {
    let app = create_test_app();
    signup(&app, "known@example.com", "010-1111-2222", "password123").await;
    app.provider
        .set_profile("kk-2002", "KNOWN@example.com", "Known Person");
    let state = valid_state(&app);

    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={state}")))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(find_refresh_cookie(&response).is_some());

    let body = body_json(response).await;
    assert!(body["accessToken"].as_str().is_some());
    assert!(body.get("signupTicket").is_none());
    assert_eq!(body["userInfo"]["name"], "Test User");
    assert_eq!(body["userInfo"]["isNewUser"], false);
}

#[tokio::test]
async fn test_callback_provider_failures() {
    let app = create_test_app();
    app.provider
        .set_profile("kk-1001", "fed@example.com", "Federated User");

    app.provider.fail_with(|| AppError::ProviderUnavailable);
    let state = valid_state(&app);
    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={state}")))
        .await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body_json(response).await["code"], "PROVIDER_UNAVAILABLE");

    app.provider.fail_with(|| AppError::TokenExchangeFailed);
    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={state}")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "TOKEN_EXCHANGE_FAILED");
}

#[tokio::test]
async fn test_callback_without_profile() {
    let app = create_test_app();
    let state = valid_state(&app);

    let response = app
        .send(get(&format!("/oauth/callback?code=abc&state={state}")))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(body_json(response).await["code"], "PROFILE_FETCH_FAILED");
}

#[tokio::test]
async fn test_federated_account_has_no_password() {
    let app = create_test_app();
    let ticket = pending_ticket(&app).await;
    let response = app
        .send(json_request(
            "POST",
            "/oauth/signup/complete",
            complete_body(&ticket, "010-5555-6666"),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .send(json_request(
            "POST",
            "/login",
            json!({ "email": "fed@example.com", "password": "anything-at-all" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "INVALID_CREDENTIALS");

    let response = app
        .send(json_request(
            "POST",
            "/password-reset/send-code",
            json!({ "phone": "010-5555-6666" }),
        ))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "FEDERATED_CREDENTIAL");
    assert_eq!(app.sms.sent_count(), 0);
}
