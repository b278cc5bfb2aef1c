// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! SMS verification state: one-time codes, send counters and the short-lived
//! "verified" flag that authorizes a password change.
//!
//! All state lives in the cache under three key families per phone number:
//!
//! | Key                   | Value     | TTL                         |
//! |-----------------------|-----------|-----------------------------|
//! | `sms:code:{phone}`    | 6 digits  | code TTL (180s)             |
//! | `sms:count:{phone}`   | counter   | send window, set on first send |
//! | `sms:verified:{phone}`| `"true"`  | verified TTL (300s)         |

use crate::config::Config;
use crate::db::CacheStore;
use crate::error::AppError;
use crate::services::constant_time_eq;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;

const CODE_PREFIX: &str = "sms:code:";
const COUNT_PREFIX: &str = "sms:count:";
const VERIFIED_PREFIX: &str = "sms:verified:";

/// Compared against when no code is stored, so a miss costs the same as a mismatch.
const CODE_PLACEHOLDER: &str = "000000";

/// Limits and lifetimes for the verification flow.
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    pub max_sends: i64,
    pub send_window: Duration,
    pub code_ttl: Duration,
    pub verified_ttl: Duration,
}

impl VerificationPolicy {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_sends: config.sms_max_sends,
            send_window: Duration::from_secs(config.sms_window_secs),
            code_ttl: Duration::from_secs(config.verification_code_ttl_secs),
            verified_ttl: Duration::from_secs(config.verified_flag_ttl_secs),
        }
    }
}

impl Default for VerificationPolicy {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

#[derive(Clone)]
pub struct VerificationService {
    cache: Arc<dyn CacheStore>,
    policy: VerificationPolicy,
}

impl VerificationService {
    pub fn new(cache: Arc<dyn CacheStore>, policy: VerificationPolicy) -> Self {
        Self { cache, policy }
    }

    pub fn policy(&self) -> &VerificationPolicy {
        &self.policy
    }

    /// Store `code` for `phone`, replacing any earlier code.
    pub async fn create_code(&self, phone: &str, code: &str) -> Result<(), AppError> {
        self.cache
            .set(&code_key(phone), code, Some(self.policy.code_ttl))
            .await?;
        Ok(())
    }

    pub async fn has_code(&self, phone: &str) -> Result<bool, AppError> {
        Ok(self.get_code(phone).await?.is_some())
    }

    pub async fn get_code(&self, phone: &str) -> Result<Option<String>, AppError> {
        Ok(self.cache.get(&code_key(phone)).await?)
    }

    pub async fn delete_code(&self, phone: &str) -> Result<bool, AppError> {
        Ok(self.cache.del(&code_key(phone)).await?)
    }

    /// Bump the send counter for `phone`, returning the new count.
    ///
    /// The window TTL is only set on the first increment, so the window runs
    /// from the first send rather than sliding with every request.
    pub async fn increment_send_count(&self, phone: &str) -> Result<i64, AppError> {
        let key = count_key(phone);
        let count = self.cache.incr(&key).await?;
        if count == 1 {
            self.cache.expire(&key, self.policy.send_window).await?;
        }
        Ok(count)
    }

    /// Count this send attempt and reject it once the window limit is exceeded.
    pub async fn reserve_send(&self, phone: &str) -> Result<i64, AppError> {
        let count = self.increment_send_count(phone).await?;
        if count > self.policy.max_sends {
            tracing::warn!(
                phone = %mask_phone(phone),
                count,
                "Verification send limit exceeded"
            );
            return Err(AppError::RateLimitExceeded);
        }
        Ok(count)
    }

    pub async fn set_verified(&self, phone: &str) -> Result<(), AppError> {
        self.cache
            .set(&verified_key(phone), "true", Some(self.policy.verified_ttl))
            .await?;
        Ok(())
    }

    pub async fn has_verified(&self, phone: &str) -> Result<bool, AppError> {
        Ok(self.cache.get(&verified_key(phone)).await?.is_some())
    }

    pub async fn clear_verified(&self, phone: &str) -> Result<bool, AppError> {
        Ok(self.cache.del(&verified_key(phone)).await?)
    }

    /// Check a submitted code. On success the code is consumed and the
    /// verified flag is set; on mismatch the stored code is left untouched.
    pub async fn verify(&self, phone: &str, submitted: &str) -> Result<(), AppError> {
        let stored = self.get_code(phone).await?;
        let expected = stored.as_deref().unwrap_or(CODE_PLACEHOLDER);
        let matches = constant_time_eq(expected, submitted) && stored.is_some();

        if !matches {
            tracing::warn!(phone = %mask_phone(phone), "Verification code rejected");
            return Err(AppError::InvalidVerificationCode);
        }

        // Only the request that actually removes the code may proceed.
        if !self.delete_code(phone).await? {
            return Err(AppError::InvalidVerificationCode);
        }

        self.set_verified(phone).await?;
        tracing::info!(phone = %mask_phone(phone), "Phone verified");
        Ok(())
    }
}

/// Uniformly random six-digit code, leading zeros allowed.
pub fn generate_code() -> String {
    let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
    format!("{:06}", n)
}

/// Phone number safe for logs: everything but the last four digits masked.
pub fn mask_phone(phone: &str) -> String {
    let digits = phone.chars().count();
    if digits <= 4 {
        return "*".repeat(digits);
    }
    let visible: String = phone.chars().skip(digits - 4).collect();
    format!("{}{}", "*".repeat(digits - 4), visible)
}

fn code_key(phone: &str) -> String {
    format!("{CODE_PREFIX}{phone}")
}

fn count_key(phone: &str) -> String {
    format!("{COUNT_PREFIX}{phone}")
}

fn verified_key(phone: &str) -> String {
    format!("{VERIFIED_PREFIX}{phone}")
}
