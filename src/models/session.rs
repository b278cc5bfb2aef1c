// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Refresh token ledger and flow results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::user::{Identity, IdentityId, Role};

/// The single current refresh token recorded for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub identity_id: IdentityId,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    /// Last login or refresh that wrote this entry
    pub updated_at: DateTime<Utc>,
}

/// Freshly minted access + refresh tokens.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    /// Unix timestamp
    pub access_expires_at: i64,
    pub refresh_token: String,
    /// Unix timestamp
    pub refresh_expires_at: i64,
}

/// User info returned by every flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub name: String,
    pub email: String,
    pub role: Role,
    pub is_new_user: bool,
}

impl UserInfo {
    pub fn existing(identity: &Identity) -> Self {
        Self {
            name: identity.name.clone(),
            email: identity.email.clone(),
            role: identity.role,
            is_new_user: false,
        }
    }
}

/// Unified outcome of the signup, login, refresh and federation flows.
///
/// `user_info.is_new_user == true` implies `tokens` is `None`.
#[derive(Debug, Clone)]
pub struct AuthResult {
    pub tokens: Option<TokenPair>,
    /// Single-use ticket for completing a federated signup
    pub signup_ticket: Option<String>,
    pub user_info: UserInfo,
}

impl AuthResult {
    /// Authenticated outcome for a known identity.
    pub fn authenticated(identity: &Identity, tokens: TokenPair) -> Self {
        Self {
            tokens: Some(tokens),
            signup_ticket: None,
            user_info: UserInfo::existing(identity),
        }
    }

    /// Federated callback outcome for an email with no identity yet.
    pub fn pending_signup(name: String, email: String, signup_ticket: String) -> Self {
        Self {
            tokens: None,
            signup_ticket: Some(signup_ticket),
            user_info: UserInfo {
                name,
                email,
                role: Role::User,
                is_new_user: true,
            },
        }
    }
}
