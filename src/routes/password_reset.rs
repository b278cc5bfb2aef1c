// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SMS-verified password reset.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{post, put},
    Json, Router,
};
use std::sync::Arc;

use crate::error::Result;
use crate::services::auth::{ChangePasswordRequest, SendCodeRequest, VerifyCodeRequest};
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/password-reset/send-code", post(send_code))
        .route("/password-reset/verify-code", post(verify_code))
        .route("/password-reset/change-password", put(change_password))
}

async fn send_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SendCodeRequest>,
) -> Result<StatusCode> {
    state.auth.send_reset_code(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn verify_code(
    State(state): State<Arc<AppState>>,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<StatusCode> {
    state.auth.verify_reset_code(request).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn change_password(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<StatusCode> {
    state.auth.change_password(request).await?;
    Ok(StatusCode::NO_CONTENT)
}
