// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::fmt;

/// Persisted entity named by a persistence failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Identity,
    Credential,
    Profile,
    BodyType,
    RefreshToken,
    VerificationCache,
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Entity::Identity => "identity",
            Entity::Credential => "credential",
            Entity::Profile => "profile",
            Entity::BodyType => "body_type",
            Entity::RefreshToken => "refresh_token",
            Entity::VerificationCache => "verification_cache",
        };
        f.write_str(name)
    }
}

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Email is already registered")]
    DuplicateEmail,

    #[error("Phone number is already registered")]
    DuplicatePhone,

    #[error("User not found")]
    UserNotFound,

    #[error("No user is registered with this phone number")]
    UserNotFoundByPhone,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("No active session")]
    NoActiveSession,

    #[error("Too many verification codes requested, try again later")]
    RateLimitExceeded,

    #[error("Invalid verification code")]
    InvalidVerificationCode,

    #[error("Phone number has not been verified")]
    UnauthorizedPasswordChange,

    #[error("Identity provider is unavailable")]
    ProviderUnavailable,

    #[error("Authorization code exchange failed")]
    TokenExchangeFailed,

    #[error("Failed to fetch provider profile")]
    ProfileFetchFailed,

    #[error("Failed to send verification SMS")]
    SmsSendFailed,

    #[error("Persistence failure on {entity}: {detail}")]
    PersistenceFailure { entity: Entity, detail: String },

    #[error("Account signs in through an external provider")]
    FederatedCredential,

    #[error("Authentication required")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn persistence(entity: Entity, detail: impl Into<String>) -> Self {
        AppError::PersistenceFailure {
            entity,
            detail: detail.into(),
        }
    }

    /// Stable machine-readable code for the response body.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::InvalidCredentials => "INVALID_CREDENTIALS",
            AppError::DuplicateEmail => "DUPLICATE_EMAIL",
            AppError::DuplicatePhone => "DUPLICATE_PHONE",
            AppError::UserNotFound => "USER_NOT_FOUND",
            AppError::UserNotFoundByPhone => "USER_NOT_FOUND_BY_PHONE",
            AppError::InvalidToken => "INVALID_TOKEN",
            AppError::ExpiredToken => "EXPIRED_TOKEN",
            AppError::NoActiveSession => "NO_ACTIVE_SESSION",
            AppError::RateLimitExceeded => "RATE_LIMIT_EXCEEDED",
            AppError::InvalidVerificationCode => "INVALID_VERIFICATION_CODE",
            AppError::UnauthorizedPasswordChange => "UNAUTHORIZED_PASSWORD_CHANGE",
            AppError::ProviderUnavailable => "PROVIDER_UNAVAILABLE",
            AppError::TokenExchangeFailed => "TOKEN_EXCHANGE_FAILED",
            AppError::ProfileFetchFailed => "PROFILE_FETCH_FAILED",
            AppError::SmsSendFailed => "SMS_SEND_FAILED",
            AppError::PersistenceFailure { .. } => "PERSISTENCE_FAILURE",
            AppError::FederatedCredential => "FEDERATED_CREDENTIAL",
            AppError::Unauthorized => "UNAUTHORIZED",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::InvalidCredentials
            | AppError::InvalidToken
            | AppError::ExpiredToken
            | AppError::Unauthorized => StatusCode::UNAUTHORIZED,
            AppError::DuplicateEmail | AppError::DuplicatePhone => StatusCode::CONFLICT,
            AppError::UserNotFound | AppError::UserNotFoundByPhone | AppError::NoActiveSession => {
                StatusCode::NOT_FOUND
            }
            AppError::RateLimitExceeded => StatusCode::TOO_MANY_REQUESTS,
            AppError::InvalidVerificationCode
            | AppError::FederatedCredential
            | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::UnauthorizedPasswordChange => StatusCode::FORBIDDEN,
            AppError::ProviderUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            AppError::TokenExchangeFailed
            | AppError::ProfileFetchFailed
            | AppError::SmsSendFailed => StatusCode::BAD_GATEWAY,
            AppError::PersistenceFailure { .. } | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        AppError::BadRequest(errors.to_string())
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::PersistenceFailure { entity, detail } => {
                tracing::error!(%entity, error = %detail, "Persistence failure");
                format!("Failed to store {entity}")
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                "Internal server error".to_string()
            }
            other => other.to_string(),
        };

        let body = ErrorResponse {
            code: self.code(),
            message,
        };

        (self.status(), Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
