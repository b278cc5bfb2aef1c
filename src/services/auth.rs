// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Authentication orchestrator.
//!
//! Composes the credential store, refresh token ledger, token service,
//! verification service, identity provider and SMS gateway into the
//! user-facing flows. Every successful login-like flow ends the same way:
//! mint a token pair and overwrite the identity's ledger entry, so only the
//! most recently issued refresh token can ever be redeemed.

use crate::db::{CredentialStore, TokenLedger};
use crate::error::AppError;
use crate::models::{
    Account, AuthResult, Consents, Credential, Gender, Identity, IdentityId, NewAccount,
    NewIdentity, Profile, Role, UserInfo,
};
use crate::services::federation::{FederationProvider, PendingSignups};
use crate::services::password::PasswordHasher;
use crate::services::sms::SmsGateway;
use crate::services::tokens::{TokenKind, TokenService};
use crate::services::verification::{generate_code, mask_phone, VerificationService};
use crate::services::constant_time_eq;
use crate::time_utils::from_unix;
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use validator::{Validate, ValidationError};

// ─── Requests ────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SignupRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 64))]
    pub password: String,
    #[validate(length(min = 1, max = 30))]
    pub name: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(range(min = 50.0, max = 300.0))]
    pub height: f64,
    #[validate(range(min = 10.0, max = 500.0))]
    pub weight: f64,
    pub gender: Gender,
    pub body_type_id: u32,
    pub consents: Consents,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Second half of a federated signup. Email, name and provider id come from
/// the profile parked under `signup_ticket`, never from the client.
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct OAuthSignupRequest {
    #[validate(length(min = 1))]
    pub signup_ticket: String,
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(range(min = 50.0, max = 300.0))]
    pub height: f64,
    #[validate(range(min = 10.0, max = 500.0))]
    pub weight: f64,
    pub gender: Gender,
    pub body_type_id: u32,
    pub consents: Consents,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendCodeRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct VerifyCodeRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(equal = 6))]
    pub code: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[validate(custom(function = "validate_phone"))]
    pub phone: String,
    #[validate(length(min = 8, max = 64))]
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdateRequest {
    #[validate(range(min = 50.0, max = 300.0))]
    pub height: f64,
    #[validate(range(min = 10.0, max = 500.0))]
    pub weight: f64,
    pub gender: Gender,
    pub body_type_id: u32,
}

// ─── Normalization ───────────────────────────────────────────

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Strip formatting from a phone number, keeping a leading `+`.
pub fn normalize_phone(phone: &str) -> String {
    let trimmed = phone.trim();
    let mut normalized = String::with_capacity(trimmed.len());
    if trimmed.starts_with('+') {
        normalized.push('+');
    }
    normalized.extend(trimmed.chars().filter(|c| c.is_ascii_digit()));
    normalized
}

fn validate_phone(phone: &str) -> Result<(), ValidationError> {
    let allowed = |c: char| c.is_ascii_digit() || matches!(c, ' ' | '-' | '(' | ')');
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();

    if body.chars().all(allowed) && (8..=15).contains(&digits) {
        Ok(())
    } else {
        Err(ValidationError::new("phone"))
    }
}

// ─── Service ─────────────────────────────────────────────────

/// Collaborators injected into [`AuthService`].
pub struct AuthComponents {
    pub store: Arc<dyn CredentialStore>,
    pub ledger: Arc<dyn TokenLedger>,
    pub tokens: TokenService,
    pub hasher: Arc<dyn PasswordHasher>,
    pub verification: VerificationService,
    pub federation: Arc<dyn FederationProvider>,
    pub pending: PendingSignups,
    pub sms: Arc<dyn SmsGateway>,
}

#[derive(Clone)]
pub struct AuthService {
    store: Arc<dyn CredentialStore>,
    ledger: Arc<dyn TokenLedger>,
    tokens: TokenService,
    hasher: Arc<dyn PasswordHasher>,
    verification: VerificationService,
    federation: Arc<dyn FederationProvider>,
    pending: PendingSignups,
    sms: Arc<dyn SmsGateway>,
}

impl AuthService {
    pub fn new(components: AuthComponents) -> Self {
        let AuthComponents {
            store,
            ledger,
            tokens,
            hasher,
            verification,
            federation,
            pending,
            sms,
        } = components;

        Self {
            store,
            ledger,
            tokens,
            hasher,
            verification,
            federation,
            pending,
            sms,
        }
    }

    // ─── Local accounts ──────────────────────────────────────

    /// Register a local account and sign it in.
    pub async fn signup(&self, request: SignupRequest) -> Result<AuthResult, AppError> {
        request.validate()?;
        require_consents(&request.consents)?;

        let email = normalize_email(&request.email);
        let phone = normalize_phone(&request.phone);

        self.ensure_unique(&email, &phone).await?;
        self.require_body_type(request.body_type_id).await?;

        let password_hash = self.hasher.hash(&request.password)?;
        let identity = self
            .store
            .insert_account(NewAccount {
                identity: NewIdentity {
                    email: email.clone(),
                    name: request.name.trim().to_string(),
                    phone,
                    role: Role::User,
                    consents: request.consents,
                },
                credential: Credential::Local { password_hash },
                profile: Profile {
                    height_cm: request.height,
                    weight_kg: request.weight,
                    gender: request.gender,
                    body_type_id: request.body_type_id,
                },
            })
            .await?;

        tracing::info!(identity_id = identity.id, "Local signup completed");

        // Sign in through the regular path so signup and login can't diverge.
        let account = self.authenticate(&email, &request.password).await?;
        self.issue_session(&account.identity).await
    }

    pub async fn login(&self, request: LoginRequest) -> Result<AuthResult, AppError> {
        request.validate()?;

        let email = normalize_email(&request.email);
        let account = self.authenticate(&email, &request.password).await?;

        tracing::info!(identity_id = account.identity.id, "Login succeeded");
        self.issue_session(&account.identity).await
    }

    async fn authenticate(&self, email: &str, password: &str) -> Result<Account, AppError> {
        let account = self
            .store
            .find_by_email(email)
            .await?
            .ok_or(AppError::UserNotFound)?;

        let Some(hash) = account.credential.password_hash() else {
            tracing::warn!(
                identity_id = account.identity.id,
                "Password login attempted on federated account"
            );
            return Err(AppError::InvalidCredentials);
        };

        if !self.hasher.verify(password, hash) {
            tracing::warn!(identity_id = account.identity.id, "Password mismatch");
            return Err(AppError::InvalidCredentials);
        }

        Ok(account)
    }

    // ─── Sessions ────────────────────────────────────────────

    /// Exchange the current refresh token for a new pair.
    ///
    /// Only the token most recently recorded in the ledger is accepted; the
    /// presented token is then replaced, so a refresh token works once.
    pub async fn refresh(&self, presented: Option<&str>) -> Result<AuthResult, AppError> {
        let token = presented
            .filter(|t| !t.is_empty())
            .ok_or(AppError::InvalidToken)?;

        let claims = self.tokens.parse(token, TokenKind::Refresh)?;

        let entry = self
            .ledger
            .find_by_identity(claims.identity_id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(identity_id = claims.identity_id, "Refresh without ledger entry");
                AppError::InvalidToken
            })?;

        if !constant_time_eq(&entry.refresh_token, token) {
            tracing::warn!(identity_id = claims.identity_id, "Stale refresh token presented");
            return Err(AppError::InvalidToken);
        }

        if entry.expires_at <= Utc::now() {
            return Err(AppError::ExpiredToken);
        }

        let account = self
            .store
            .find_by_id(claims.identity_id)
            .await?
            .ok_or(AppError::InvalidToken)?;

        self.issue_session(&account.identity).await
    }

    /// Revoke the identity's refresh token.
    pub async fn logout(&self, identity_id: IdentityId) -> Result<(), AppError> {
        let deleted = self.ledger.delete_by_identity(identity_id).await?;
        if deleted == 0 {
            tracing::info!(identity_id, "Logout without active session");
            return Err(AppError::NoActiveSession);
        }

        tracing::info!(identity_id, "Logged out");
        Ok(())
    }

    pub async fn me(&self, identity_id: IdentityId) -> Result<UserInfo, AppError> {
        self.store
            .find_by_id(identity_id)
            .await?
            .map(|account| UserInfo::existing(&account.identity))
            .ok_or(AppError::UserNotFound)
    }

    pub async fn update_profile(
        &self,
        identity_id: IdentityId,
        request: ProfileUpdateRequest,
    ) -> Result<Profile, AppError> {
        request.validate()?;
        self.require_body_type(request.body_type_id).await?;

        let profile = Profile {
            height_cm: request.height,
            weight_kg: request.weight,
            gender: request.gender,
            body_type_id: request.body_type_id,
        };
        self.store.update_profile(identity_id, profile.clone()).await?;

        tracing::info!(identity_id, "Profile updated");
        Ok(profile)
    }

    async fn issue_session(&self, identity: &Identity) -> Result<AuthResult, AppError> {
        let pair = self.tokens.issue_pair(identity.id, &identity.email)?;
        self.ledger
            .save_or_rotate(
                identity.id,
                &pair.refresh_token,
                from_unix(pair.refresh_expires_at),
            )
            .await?;

        Ok(AuthResult::authenticated(identity, pair))
    }

    // ─── Federation ──────────────────────────────────────────

    pub fn authorize_url(&self, state: &str) -> String {
        self.federation.authorize_url(state)
    }

    /// Complete the provider redirect.
    ///
    /// Known emails are signed in. Unknown emails get a signup ticket and no
    /// tokens; nothing is persisted until [`Self::complete_oauth_signup`].
    pub async fn oauth_callback(&self, code: &str) -> Result<AuthResult, AppError> {
        let provider_token = self.federation.exchange_code(code).await?;
        let profile = self.federation.fetch_profile(&provider_token).await?;
        let email = normalize_email(&profile.email);

        let Some(account) = self.store.find_by_email(&email).await? else {
            let ticket = self.pending.park(&profile).await?;
            tracing::info!(provider = self.federation.name(), "New federated user, signup pending");
            return Ok(AuthResult::pending_signup(
                profile.display_name,
                email,
                ticket,
            ));
        };

        tracing::info!(identity_id = account.identity.id, "Federated login succeeded");
        self.issue_session(&account.identity).await
    }

    pub async fn complete_oauth_signup(
        &self,
        request: OAuthSignupRequest,
    ) -> Result<AuthResult, AppError> {
        request.validate()?;
        require_consents(&request.consents)?;

        let profile = self
            .pending
            .peek(&request.signup_ticket)
            .await?
            .ok_or(AppError::InvalidToken)?;

        let email = normalize_email(&profile.email);
        let phone = normalize_phone(&request.phone);

        self.ensure_unique(&email, &phone).await?;
        self.require_body_type(request.body_type_id).await?;

        let identity = self
            .store
            .insert_account(NewAccount {
                identity: NewIdentity {
                    email,
                    name: profile.display_name.clone(),
                    phone,
                    role: Role::User,
                    consents: request.consents,
                },
                credential: Credential::Federated {
                    provider: self.federation.name().to_string(),
                    provider_id: profile.provider_id.clone(),
                },
                profile: Profile {
                    height_cm: request.height,
                    weight_kg: request.weight,
                    gender: request.gender,
                    body_type_id: request.body_type_id,
                },
            })
            .await?;

        if let Err(e) = self.pending.discard(&request.signup_ticket).await {
            tracing::warn!(error = %e, "Failed to discard redeemed signup ticket");
        }

        tracing::info!(identity_id = identity.id, "Federated signup completed");
        self.issue_session(&identity).await
    }

    // ─── Password reset ──────────────────────────────────────

    /// Send a one-time code to the phone of a registered local account.
    ///
    /// The code is only stored after the SMS went out, so a failed send never
    /// leaves behind a code the user could not have received.
    pub async fn send_reset_code(&self, request: SendCodeRequest) -> Result<(), AppError> {
        request.validate()?;
        let phone = normalize_phone(&request.phone);

        let account = self
            .store
            .find_by_phone(&phone)
            .await?
            .ok_or(AppError::UserNotFoundByPhone)?;
        if account.credential.is_federated() {
            return Err(AppError::FederatedCredential);
        }

        let sent = self.verification.reserve_send(&phone).await?;

        let code = generate_code();
        let message = format!("[FitCheck] Your verification code is {code}");
        self.sms.send(&phone, &message).await?;
        self.verification.create_code(&phone, &code).await?;

        tracing::info!(phone = %mask_phone(&phone), sent, "Verification code sent");
        Ok(())
    }

    pub async fn verify_reset_code(&self, request: VerifyCodeRequest) -> Result<(), AppError> {
        request.validate()?;
        let phone = normalize_phone(&request.phone);
        self.verification.verify(&phone, &request.code).await
    }

    /// Set a new password for a phone verified within the last few minutes.
    ///
    /// The verified flag is cleared afterwards, so each verification permits
    /// one change.
    pub async fn change_password(&self, request: ChangePasswordRequest) -> Result<(), AppError> {
        request.validate()?;
        let phone = normalize_phone(&request.phone);

        if !self.verification.has_verified(&phone).await? {
            tracing::warn!(phone = %mask_phone(&phone), "Password change without verification");
            return Err(AppError::UnauthorizedPasswordChange);
        }

        let account = self
            .store
            .find_by_phone(&phone)
            .await?
            .ok_or(AppError::UserNotFoundByPhone)?;
        if account.credential.is_federated() {
            return Err(AppError::FederatedCredential);
        }

        let password_hash = self.hasher.hash(&request.new_password)?;
        self.store
            .update_credential_password(account.identity.id, &password_hash)
            .await?;
        self.verification.clear_verified(&phone).await?;

        tracing::info!(identity_id = account.identity.id, "Password changed");
        Ok(())
    }

    // ─── Helpers ─────────────────────────────────────────────

    async fn ensure_unique(&self, email: &str, phone: &str) -> Result<(), AppError> {
        if self.store.exists_by_email(email).await? {
            return Err(AppError::DuplicateEmail);
        }
        if self.store.exists_by_phone(phone).await? {
            return Err(AppError::DuplicatePhone);
        }
        Ok(())
    }

    async fn require_body_type(&self, body_type_id: u32) -> Result<(), AppError> {
        match self.store.find_body_type(body_type_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::BadRequest(format!(
                "unknown body type {body_type_id}"
            ))),
        }
    }
}

fn require_consents(consents: &Consents) -> Result<(), AppError> {
    if consents.required_given() {
        Ok(())
    } else {
        Err(AppError::BadRequest(
            "terms of service and privacy policy consent are required".to_string(),
        ))
    }
}
