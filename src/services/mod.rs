// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod auth;
pub mod federation;
pub mod password;
pub mod sms;
pub mod tokens;
pub mod verification;

pub use auth::{AuthComponents, AuthService};
pub use federation::{FederationProvider, OAuthClient, PendingSignups, ProviderProfile};
pub use password::{Argon2Hasher, PasswordHasher};
pub use sms::{gateway_from_config, HttpSmsGateway, LogSmsGateway, SmsGateway};
pub use tokens::{TokenClaims, TokenKind, TokenService};
pub use verification::{VerificationPolicy, VerificationService};

use subtle::ConstantTimeEq;

/// Compare two secrets without short-circuiting on the first differing byte.
pub(crate) fn constant_time_eq(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}
