// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! FitCheck Auth API Server
//!
//! Serves signup, login, token refresh, OAuth and password reset flows.

use anyhow::Context;
use fitcheck_auth::{
    config::Config,
    db::{MemoryCache, MemoryLedger, MemoryStore},
    services::{
        gateway_from_config, Argon2Hasher, AuthComponents, AuthService, OAuthClient,
        PendingSignups, TokenService, VerificationPolicy, VerificationService,
    },
    AppState,
};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often expired cache entries are swept.
const CACHE_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize structured JSON logging
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!(port = config.port, "Starting FitCheck Auth API");

    // In-process backends
    let store = Arc::new(MemoryStore::with_default_body_types());
    let ledger = Arc::new(MemoryLedger::new());
    let cache = Arc::new(MemoryCache::new());
    spawn_cache_purge(cache.clone());
    tracing::info!("Storage backends initialized");

    let tokens = TokenService::from_config(&config);

    let federation =
        Arc::new(OAuthClient::new(&config).context("Failed to initialize OAuth client")?);
    let sms = gateway_from_config(&config).context("Failed to initialize SMS gateway")?;
    tracing::info!(
        authorize_url = %config.oauth_authorize_url,
        sms_enabled = config.sms_api_url.is_some(),
        "External integrations initialized"
    );

    let auth = AuthService::new(AuthComponents {
        store,
        ledger,
        tokens: tokens.clone(),
        hasher: Arc::new(Argon2Hasher::new()),
        verification: VerificationService::new(
            cache.clone(),
            VerificationPolicy::from_config(&config),
        ),
        federation,
        pending: PendingSignups::new(
            cache,
            Duration::from_secs(config.pending_signup_ttl_secs),
        ),
        sms,
    });

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        tokens,
        auth,
    });

    // Build router
    let app = fitcheck_auth::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

fn spawn_cache_purge(cache: Arc<MemoryCache>) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(CACHE_PURGE_INTERVAL);
        loop {
            interval.tick().await;
            cache.purge_expired();
        }
    });
}

/// Initialize structured JSON logging.
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,fitcheck_auth=debug"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
