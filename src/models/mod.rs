// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod session;
pub mod user;

pub use session::{AuthResult, LedgerEntry, TokenPair, UserInfo};
pub use user::{
    Account, BodyType, Consents, Credential, Gender, Identity, IdentityId, NewAccount,
    NewIdentity, Profile, Role,
};
