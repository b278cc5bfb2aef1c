// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Identity, credential and profile records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity ID (also the token subject).
pub type IdentityId = u64;

/// Single role flag carried on every identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Gender {
    Male,
    Female,
}

/// Consent flags captured at signup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Consents {
    /// Terms of service (required)
    pub terms_of_service: bool,
    /// Privacy policy (required)
    pub privacy_policy: bool,
    /// Marketing messages (optional)
    #[serde(default)]
    pub marketing: bool,
}

impl Consents {
    /// Whether every mandatory consent was given.
    pub fn required_given(&self) -> bool {
        self.terms_of_service && self.privacy_policy
    }
}

/// A registered user's core record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    /// Unique, lower-cased
    pub email: String,
    /// Display name
    pub name: String,
    /// Unique, normalized digits
    pub phone: String,
    pub role: Role,
    pub consents: Consents,
    pub created_at: DateTime<Utc>,
}

/// Authentication method bound to an identity.
///
/// Exactly one of the two shapes exists per identity, so a credential can
/// never carry both a password hash and a provider binding (or neither).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Credential {
    Local {
        password_hash: String,
    },
    Federated {
        provider: String,
        provider_id: String,
    },
}

impl Credential {
    pub fn password_hash(&self) -> Option<&str> {
        match self {
            Credential::Local { password_hash } => Some(password_hash),
            Credential::Federated { .. } => None,
        }
    }

    pub fn is_federated(&self) -> bool {
        matches!(self, Credential::Federated { .. })
    }
}

/// Physical attributes attached to an identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub height_cm: f64,
    pub weight_kg: f64,
    pub gender: Gender,
    /// Reference into the body type lookup table
    pub body_type_id: u32,
}

/// Body type lookup row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodyType {
    pub id: u32,
    pub name: String,
}

/// Identity joined with its credential and profile.
///
/// Stores return this projection explicitly; nothing is fetched lazily.
#[derive(Debug, Clone)]
pub struct Account {
    pub identity: Identity,
    pub credential: Credential,
    pub profile: Profile,
}

/// Identity fields supplied at signup (id and timestamps are assigned by the store).
#[derive(Debug, Clone)]
pub struct NewIdentity {
    pub email: String,
    pub name: String,
    pub phone: String,
    pub role: Role,
    pub consents: Consents,
}

/// Everything written by a single signup transaction.
#[derive(Debug, Clone)]
pub struct NewAccount {
    pub identity: NewIdentity,
    pub credential: Credential,
    pub profile: Profile,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_shapes_are_exclusive() {
        let local = Credential::Local {
            password_hash: "$argon2id$...".to_string(),
        };
        assert_eq!(local.password_hash(), Some("$argon2id$..."));
        assert!(!local.is_federated());

        let federated = Credential::Federated {
            provider: "oauth".to_string(),
            provider_id: "42".to_string(),
        };
        assert_eq!(federated.password_hash(), None);
        assert!(federated.is_federated());
    }

    #[test]
    fn consents_require_terms_and_privacy() {
        let mut consents = Consents {
            terms_of_service: true,
            privacy_policy: true,
            marketing: false,
        };
        assert!(consents.required_given());

        consents.privacy_policy = false;
        assert!(!consents.required_given());
    }

    #[test]
    fn role_serializes_screaming_case() {
        assert_eq!(serde_json::to_string(&Role::Admin).unwrap(), "\"ADMIN\"");
        assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "\"FEMALE\"");
    }
}
