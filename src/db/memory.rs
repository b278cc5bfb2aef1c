// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory relational backend.
//!
//! Tables live behind a single lock so each signup runs as one transaction:
//! uniqueness is checked and all rows are written (or rolled back) while the
//! write guard is held. Concurrent signups with the same email serialize on
//! the lock and the loser gets a uniqueness error instead of blocking.

use super::{CredentialStore, StoreError, TokenLedger};
use crate::error::Entity;
use crate::models::{
    Account, BodyType, Credential, Identity, IdentityId, LedgerEntry, NewAccount, NewIdentity,
    Profile,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Row counts per table (for diagnostics and tests).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RowCounts {
    pub identities: usize,
    pub credentials: usize,
    pub profiles: usize,
}

#[derive(Default)]
struct Tables {
    next_id: IdentityId,
    identities: HashMap<IdentityId, Identity>,
    credentials: HashMap<IdentityId, Credential>,
    profiles: HashMap<IdentityId, Profile>,
    body_types: HashMap<u32, BodyType>,

    // ─── Unique indexes ──────────────────────────────────────────
    emails: HashMap<String, IdentityId>,
    phones: HashMap<String, IdentityId>,
    provider_bindings: HashMap<(String, String), IdentityId>,
}

impl Tables {
    fn insert_identity(&mut self, new: NewIdentity) -> Result<Identity, StoreError> {
        if self.emails.contains_key(&new.email) {
            return Err(StoreError::DuplicateEmail);
        }
        if self.phones.contains_key(&new.phone) {
            return Err(StoreError::DuplicatePhone);
        }

        self.next_id += 1;
        let identity = Identity {
            id: self.next_id,
            email: new.email,
            name: new.name,
            phone: new.phone,
            role: new.role,
            consents: new.consents,
            created_at: Utc::now(),
        };

        self.emails.insert(identity.email.clone(), identity.id);
        self.phones.insert(identity.phone.clone(), identity.id);
        self.identities.insert(identity.id, identity.clone());
        Ok(identity)
    }

    fn insert_credential(
        &mut self,
        identity_id: IdentityId,
        credential: Credential,
    ) -> Result<(), StoreError> {
        if let Credential::Federated {
            provider,
            provider_id,
        } = &credential
        {
            let key = (provider.clone(), provider_id.clone());
            if self.provider_bindings.contains_key(&key) {
                return Err(StoreError::failure(
                    Entity::Credential,
                    "provider binding already exists",
                ));
            }
            self.provider_bindings.insert(key, identity_id);
        }

        self.credentials.insert(identity_id, credential);
        Ok(())
    }

    fn insert_profile(&mut self, identity_id: IdentityId, profile: Profile) -> Result<(), StoreError> {
        if !self.body_types.contains_key(&profile.body_type_id) {
            return Err(StoreError::failure(
                Entity::Profile,
                format!("body type {} does not exist", profile.body_type_id),
            ));
        }

        self.profiles.insert(identity_id, profile);
        Ok(())
    }

    /// Undo a partially applied signup.
    fn rollback(&mut self, identity_id: IdentityId) {
        if let Some(identity) = self.identities.remove(&identity_id) {
            self.emails.remove(&identity.email);
            self.phones.remove(&identity.phone);
        }
        if let Some(Credential::Federated {
            provider,
            provider_id,
        }) = self.credentials.remove(&identity_id)
        {
            self.provider_bindings.remove(&(provider, provider_id));
        }
        self.profiles.remove(&identity_id);
    }

    fn account(&self, id: IdentityId) -> Result<Option<Account>, StoreError> {
        let Some(identity) = self.identities.get(&id) else {
            return Ok(None);
        };

        let credential = self.credentials.get(&id).ok_or_else(|| {
            StoreError::failure(Entity::Credential, format!("identity {id} has no credential"))
        })?;
        let profile = self.profiles.get(&id).ok_or_else(|| {
            StoreError::failure(Entity::Profile, format!("identity {id} has no profile"))
        })?;

        Ok(Some(Account {
            identity: identity.clone(),
            credential: credential.clone(),
            profile: profile.clone(),
        }))
    }
}

/// In-memory [`CredentialStore`].
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Create a store seeded with the given body type lookup rows.
    pub fn new(body_types: Vec<BodyType>) -> Self {
        let tables = Tables {
            body_types: body_types.into_iter().map(|b| (b.id, b)).collect(),
            ..Default::default()
        };
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Create a store seeded with the standard body types.
    pub fn with_default_body_types() -> Self {
        let names = ["slim", "average", "athletic", "curvy", "plus"];
        Self::new(
            names
                .iter()
                .zip(1u32..)
                .map(|(name, id)| BodyType {
                    id,
                    name: name.to_string(),
                })
                .collect(),
        )
    }

    pub async fn row_counts(&self) -> RowCounts {
        let tables = self.tables.read().await;
        RowCounts {
            identities: tables.identities.len(),
            credentials: tables.credentials.len(),
            profiles: tables.profiles.len(),
        }
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.emails.contains_key(email))
    }

    async fn exists_by_phone(&self, phone: &str) -> Result<bool, StoreError> {
        Ok(self.tables.read().await.phones.contains_key(phone))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read().await;
        match tables.emails.get(email) {
            Some(id) => tables.account(*id),
            None => Ok(None),
        }
    }

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, StoreError> {
        let tables = self.tables.read().await;
        match tables.phones.get(phone) {
            Some(id) => tables.account(*id),
            None => Ok(None),
        }
    }

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Account>, StoreError> {
        self.tables.read().await.account(id)
    }

    async fn find_body_type(&self, id: u32) -> Result<Option<BodyType>, StoreError> {
        Ok(self.tables.read().await.body_types.get(&id).cloned())
    }

    async fn insert_account(&self, account: NewAccount) -> Result<Identity, StoreError> {
        let mut tables = self.tables.write().await;

        let identity = tables.insert_identity(account.identity)?;
        let rest = tables
            .insert_credential(identity.id, account.credential)
            .and_then(|_| tables.insert_profile(identity.id, account.profile));

        if let Err(e) = rest {
            tables.rollback(identity.id);
            return Err(e);
        }

        Ok(identity)
    }

    async fn update_credential_password(
        &self,
        id: IdentityId,
        password_hash: &str,
    ) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        match tables.credentials.get_mut(&id) {
            Some(Credential::Local { password_hash: hash }) => {
                *hash = password_hash.to_string();
                Ok(())
            }
            Some(Credential::Federated { .. }) => Err(StoreError::failure(
                Entity::Credential,
                format!("identity {id} has a federated credential"),
            )),
            None => Err(StoreError::failure(
                Entity::Credential,
                format!("identity {id} has no credential"),
            )),
        }
    }

    async fn update_profile(&self, id: IdentityId, profile: Profile) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.profiles.contains_key(&id) {
            return Err(StoreError::failure(
                Entity::Profile,
                format!("identity {id} has no profile"),
            ));
        }
        tables.insert_profile(id, profile)
    }
}

/// In-memory [`TokenLedger`], one entry per identity.
#[derive(Default)]
pub struct MemoryLedger {
    entries: DashMap<IdentityId, LedgerEntry>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl TokenLedger for MemoryLedger {
    async fn save_or_rotate(
        &self,
        identity_id: IdentityId,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.entries.insert(
            identity_id,
            LedgerEntry {
                identity_id,
                refresh_token: refresh_token.to_string(),
                expires_at,
                updated_at: Utc::now(),
            },
        );
        Ok(())
    }

    async fn find_by_identity(
        &self,
        identity_id: IdentityId,
    ) -> Result<Option<LedgerEntry>, StoreError> {
        Ok(self.entries.get(&identity_id).map(|e| e.value().clone()))
    }

    async fn delete_by_identity(&self, identity_id: IdentityId) -> Result<u64, StoreError> {
        Ok(self.entries.remove(&identity_id).map_or(0, |_| 1))
    }
}
