// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Plangrove Home: Google Smart Home integration for Plangrove groves.
//!
//! This crate provides the account-linking OAuth endpoints and the Smart
//! Home fulfillment webhook that let users water their plants by voice.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;
use services::{DeviceService, HomeGraphService, OAuthService};

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
    pub oauth: OAuthService,
    pub devices: DeviceService,
    pub homegraph: HomeGraphService,
}
