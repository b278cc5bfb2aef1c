//! Persistence boundary.
//!
//! The orchestrator consumes the relational store and the cache store through
//! the narrow traits below. The in-memory backends in [`memory`] and [`cache`]
//! honor the same uniqueness and atomicity guarantees as the production stores.

pub mod cache;
pub mod memory;

pub use cache::{CacheError, CacheStore, MemoryCache};
pub use memory::{MemoryLedger, MemoryStore};

use crate::error::{AppError, Entity};
use crate::models::{Account, BodyType, Identity, IdentityId, LedgerEntry, NewAccount, Profile};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Store-level failures.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("email uniqueness violated")]
    DuplicateEmail,

    #[error("phone uniqueness violated")]
    DuplicatePhone,

    #[error("{entity}: {detail}")]
    Failure { entity: Entity, detail: String },
}

impl StoreError {
    pub fn failure(entity: Entity, detail: impl Into<String>) -> Self {
        StoreError::Failure {
            entity,
            detail: detail.into(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::DuplicateEmail => AppError::DuplicateEmail,
            StoreError::DuplicatePhone => AppError::DuplicatePhone,
            StoreError::Failure { entity, detail } => AppError::PersistenceFailure { entity, detail },
        }
    }
}

impl From<CacheError> for AppError {
    fn from(err: CacheError) -> Self {
        AppError::persistence(Entity::VerificationCache, err.to_string())
    }
}

/// Identity / credential / profile persistence.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn exists_by_email(&self, email: &str) -> Result<bool, StoreError>;

    async fn exists_by_phone(&self, phone: &str) -> Result<bool, StoreError>;

    /// Identity with its credential and profile.
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_phone(&self, phone: &str) -> Result<Option<Account>, StoreError>;

    async fn find_by_id(&self, id: IdentityId) -> Result<Option<Account>, StoreError>;

    async fn find_body_type(&self, id: u32) -> Result<Option<BodyType>, StoreError>;

    /// Insert identity, credential and profile in one transaction.
    ///
    /// Either all three rows exist afterwards or none do. Uniqueness violations
    /// surface as [`StoreError::DuplicateEmail`] / [`StoreError::DuplicatePhone`].
    async fn insert_account(&self, account: NewAccount) -> Result<Identity, StoreError>;

    async fn update_credential_password(
        &self,
        id: IdentityId,
        password_hash: &str,
    ) -> Result<(), StoreError>;

    async fn update_profile(&self, id: IdentityId, profile: Profile) -> Result<(), StoreError>;
}

/// One refresh token record per identity.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Upsert by identity, unconditionally overwriting any prior record.
    async fn save_or_rotate(
        &self,
        identity_id: IdentityId,
        refresh_token: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    async fn find_by_identity(
        &self,
        identity_id: IdentityId,
    ) -> Result<Option<LedgerEntry>, StoreError>;

    /// Returns the number of rows deleted (0 or 1).
    async fn delete_by_identity(&self, identity_id: IdentityId) -> Result<u64, StoreError>;
}
