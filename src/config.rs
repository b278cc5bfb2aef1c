//! Application configuration loaded from environment variables.
//!
//! Everything is read once at startup and treated as read-only afterwards.

use axum_extra::extract::cookie::SameSite;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Server ---
    /// Server port
    pub port: u16,
    /// Frontend URL allowed by CORS
    pub frontend_url: String,

    // --- Tokens ---
    /// HMAC-SHA256 signing key for access/refresh tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    pub access_token_ttl_secs: i64,
    /// Also used as the refresh cookie Max-Age
    pub refresh_token_ttl_secs: i64,

    // --- Refresh cookie ---
    pub cookie_secure: bool,
    pub cookie_same_site: SameSite,

    // --- OAuth provider ---
    pub oauth_client_id: String,
    pub oauth_client_secret: Option<String>,
    pub oauth_redirect_uri: String,
    pub oauth_authorize_url: String,
    pub oauth_token_url: String,
    pub oauth_profile_url: String,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,

    // --- SMS gateway (log-only when unset) ---
    pub sms_api_url: Option<String>,
    pub sms_api_key: Option<String>,
    pub sms_sender: Option<String>,

    /// Bounded timeout for provider and SMS calls
    pub http_timeout: Duration,

    // --- Verification ---
    pub sms_max_sends: i64,
    pub sms_window_secs: u64,
    pub verification_code_ttl_secs: u64,
    pub verified_flag_ttl_secs: u64,
    pub pending_signup_ttl_secs: u64,
}

impl Default for Config {
    /// Default config for testing only.
    fn default() -> Self {
        Self {
            port: 8080,
            frontend_url: "http://localhost:5173".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!!".to_vec(),
            access_token_ttl_secs: 30 * 60,
            refresh_token_ttl_secs: 14 * 24 * 60 * 60,
            cookie_secure: false,
            cookie_same_site: SameSite::Lax,
            oauth_client_id: "test_client_id".to_string(),
            oauth_client_secret: None,
            oauth_redirect_uri: "http://localhost:5173/oauth/callback".to_string(),
            oauth_authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
            oauth_token_url: DEFAULT_TOKEN_URL.to_string(),
            oauth_profile_url: DEFAULT_PROFILE_URL.to_string(),
            oauth_state_key: b"test_state_key".to_vec(),
            sms_api_url: None,
            sms_api_key: None,
            sms_sender: None,
            http_timeout: Duration::from_secs(5),
            sms_max_sends: 5,
            sms_window_secs: 3600,
            verification_code_ttl_secs: 180,
            verified_flag_ttl_secs: 300,
            pending_signup_ttl_secs: 600,
        }
    }
}

const DEFAULT_AUTHORIZE_URL: &str = "https://kauth.kakao.com/oauth/authorize";
const DEFAULT_TOKEN_URL: &str = "https://kauth.kakao.com/oauth/token";
const DEFAULT_PROFILE_URL: &str = "https://kapi.kakao.com/v2/user/me";

/// Shortest signing key accepted for HS256.
const MIN_SIGNING_KEY_LEN: usize = 32;

impl Config {
    /// Load configuration from environment variables (and `.env` if present).
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .trim()
            .as_bytes()
            .to_vec();
        if jwt_signing_key.len() < MIN_SIGNING_KEY_LEN {
            return Err(ConfigError::Invalid("JWT_SIGNING_KEY"));
        }

        let oauth_state_key = optional("OAUTH_STATE_KEY")
            .map(String::into_bytes)
            .unwrap_or_else(|| jwt_signing_key.clone());

        Ok(Self {
            port: parse_or("PORT", 8080)?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),

            jwt_signing_key,
            access_token_ttl_secs: parse_or("ACCESS_TOKEN_TTL_SECS", 30 * 60)?,
            refresh_token_ttl_secs: parse_or("REFRESH_TOKEN_TTL_SECS", 14 * 24 * 60 * 60)?,

            cookie_secure: parse_or("COOKIE_SECURE", true)?,
            cookie_same_site: optional("COOKIE_SAME_SITE")
                .map(|v| parse_same_site(&v).ok_or(ConfigError::Invalid("COOKIE_SAME_SITE")))
                .transpose()?
                .unwrap_or(SameSite::Lax),

            oauth_client_id: required("OAUTH_CLIENT_ID")?,
            oauth_client_secret: optional("OAUTH_CLIENT_SECRET"),
            oauth_redirect_uri: required("OAUTH_REDIRECT_URI")?,
            oauth_authorize_url: optional("OAUTH_AUTHORIZE_URL")
                .unwrap_or_else(|| DEFAULT_AUTHORIZE_URL.to_string()),
            oauth_token_url: optional("OAUTH_TOKEN_URL")
                .unwrap_or_else(|| DEFAULT_TOKEN_URL.to_string()),
            oauth_profile_url: optional("OAUTH_PROFILE_URL")
                .unwrap_or_else(|| DEFAULT_PROFILE_URL.to_string()),
            oauth_state_key,

            sms_api_url: optional("SMS_API_URL"),
            sms_api_key: optional("SMS_API_KEY"),
            sms_sender: optional("SMS_SENDER"),

            http_timeout: Duration::from_secs(parse_or("HTTP_TIMEOUT_SECS", 5)?),

            sms_max_sends: parse_or("SMS_MAX_SENDS", 5)?,
            sms_window_secs: parse_or("SMS_WINDOW_SECS", 3600)?,
            verification_code_ttl_secs: parse_or("VERIFICATION_CODE_TTL_SECS", 180)?,
            verified_flag_ttl_secs: parse_or("VERIFIED_FLAG_TTL_SECS", 300)?,
            pending_signup_ttl_secs: parse_or("PENDING_SIGNUP_TTL_SECS", 600)?,
        })
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    optional(name).ok_or(ConfigError::Missing(name))
}

/// Read a variable, treating blank values as unset.
fn optional(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional(name) {
        Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid(name)),
        None => Ok(default),
    }
}

fn parse_same_site(value: &str) -> Option<SameSite> {
    match value.to_ascii_lowercase().as_str() {
        "strict" => Some(SameSite::Strict),
        "lax" => Some(SameSite::Lax),
        "none" => Some(SameSite::None),
        _ => None,
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
