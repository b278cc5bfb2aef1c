// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! FitCheck auth: account, session and verification backend.
//!
//! This crate provides local and federated signup/login, rotating refresh
//! tokens held in an HttpOnly cookie, and SMS-verified password reset.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use services::{AuthService, TokenService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    /// Access token verification for the auth middleware
    pub tokens: TokenService,
    pub auth: AuthService,
}
