// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Bearer access token middleware.

use crate::error::AppError;
use crate::models::IdentityId;
use crate::services::tokens::TokenKind;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use std::sync::Arc;

/// Authenticated identity extracted from the access token.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub identity_id: IdentityId,
    pub email: String,
}

/// Middleware that requires a valid, unexpired access token.
///
/// Only the `Authorization: Bearer` header is consulted; the refresh cookie
/// is never accepted as an access credential.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or(AppError::Unauthorized)?;

    let claims = state.tokens.parse(token, TokenKind::Access)?;

    request.extensions_mut().insert(AuthUser {
        identity_id: claims.identity_id,
        email: claims.email,
    });

    Ok(next.run(request).await)
}
