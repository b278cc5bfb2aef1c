// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Access/refresh token minting and parsing (HS256).
//!
//! Both token kinds share one claim schema: subject = identity id, `email`,
//! `typ`, `iat`, `exp` and a random `jti`. `typ` keeps a refresh token from
//! being accepted where an access token is expected and vice versa. Expiry is
//! checked here rather than by `jsonwebtoken` so a structurally valid but
//! expired token can be reported separately from a forged or malformed one.

use crate::config::Config;
use crate::error::AppError;
use crate::models::{IdentityId, TokenPair};
use crate::time_utils::unix_now;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Which half of a pair a token is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (identity ID)
    pub sub: String,
    pub email: String,
    pub typ: TokenKind,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Unique token id, keeps tokens minted in the same second distinct
    pub jti: String,
}

/// A signed token and its expiry.
#[derive(Debug, Clone)]
pub struct MintedToken {
    pub token: String,
    pub expires_at: i64,
}

/// Claims extracted from a valid, unexpired token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub identity_id: IdentityId,
    pub email: String,
    pub expires_at: i64,
}

/// Stateless token service; cheap to clone and safe to share across tasks.
#[derive(Clone)]
pub struct TokenService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_ttl_secs: i64,
    refresh_ttl_secs: i64,
}

impl TokenService {
    pub fn new(signing_key: &[u8], access_ttl_secs: i64, refresh_ttl_secs: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(signing_key),
            decoding_key: DecodingKey::from_secret(signing_key),
            access_ttl_secs,
            refresh_ttl_secs,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            &config.jwt_signing_key,
            config.access_token_ttl_secs,
            config.refresh_token_ttl_secs,
        )
    }

    pub fn refresh_ttl_secs(&self) -> i64 {
        self.refresh_ttl_secs
    }

    /// Mint a token of `kind` for `identity_id` valid for `ttl_secs` from now.
    pub fn mint(
        &self,
        identity_id: IdentityId,
        email: &str,
        kind: TokenKind,
        ttl_secs: i64,
    ) -> Result<MintedToken, AppError> {
        self.mint_at(identity_id, email, kind, ttl_secs, unix_now())
    }

    pub fn mint_at(
        &self,
        identity_id: IdentityId,
        email: &str,
        kind: TokenKind,
        ttl_secs: i64,
        now: i64,
    ) -> Result<MintedToken, AppError> {
        let claims = Claims {
            sub: identity_id.to_string(),
            email: email.to_string(),
            typ: kind,
            iat: now,
            exp: now + ttl_secs,
            jti: uuid::Uuid::new_v4().simple().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

        Ok(MintedToken {
            token,
            expires_at: claims.exp,
        })
    }

    /// Mint a fresh access + refresh pair.
    pub fn issue_pair(&self, identity_id: IdentityId, email: &str) -> Result<TokenPair, AppError> {
        let now = unix_now();
        let access = self.mint_at(
            identity_id,
            email,
            TokenKind::Access,
            self.access_ttl_secs,
            now,
        )?;
        let refresh = self.mint_at(
            identity_id,
            email,
            TokenKind::Refresh,
            self.refresh_ttl_secs,
            now,
        )?;

        Ok(TokenPair {
            access_token: access.token,
            access_expires_at: access.expires_at,
            refresh_token: refresh.token,
            refresh_expires_at: refresh.expires_at,
        })
    }

    /// Signature and structure check only; expiry is ignored.
    pub fn validate(&self, token: &str) -> bool {
        self.decode_claims(token).is_ok()
    }

    /// Parse a token of the expected kind, distinguishing expired from
    /// invalid. A token of the other kind is invalid.
    pub fn parse(&self, token: &str, kind: TokenKind) -> Result<TokenClaims, AppError> {
        self.parse_at(token, kind, unix_now())
    }

    pub fn parse_at(
        &self,
        token: &str,
        kind: TokenKind,
        now: i64,
    ) -> Result<TokenClaims, AppError> {
        let claims = self.decode_claims(token)?;

        if claims.typ != kind {
            tracing::warn!(expected = ?kind, presented = ?claims.typ, "Token of wrong kind");
            return Err(AppError::InvalidToken);
        }

        let identity_id: IdentityId = claims.sub.parse().map_err(|_| AppError::InvalidToken)?;

        if now >= claims.exp {
            return Err(AppError::ExpiredToken);
        }

        Ok(TokenClaims {
            identity_id,
            email: claims.email,
            expires_at: claims.exp,
        })
    }

    fn decode_claims(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.set_required_spec_claims(&["sub", "exp", "iat"]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|_| AppError::InvalidToken)
    }
}
