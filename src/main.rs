// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plangrove Home API Server
//!
//! Links Plangrove groves to Google Smart Home so watering reminders and
//! "water the fern" voice commands reach the right plants.

use plangrove_home::{
    config::Config,
    db::FirestoreDb,
    services::{DeviceService, HomeGraphService, OAuthService},
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env().expect("Failed to load configuration");
    tracing::info!(port = config.port, "Starting Plangrove Home API");

    // Initialize Firestore database
    let db = FirestoreDb::new(&config.gcp_project_id)
        .await
        .expect("Failed to connect to Firestore");

    let oauth = OAuthService::new(db.clone(), &config);
    let devices = DeviceService::new(db.clone());

    let homegraph = HomeGraphService::new(config.homegraph_api_key.clone());
    if homegraph.is_configured() {
        tracing::info!("HomeGraph Request-Sync enabled");
    } else {
        tracing::info!("HomeGraph Request-Sync disabled (no API key)");
    }

    // Build shared state
    let state = Arc::new(AppState {
        config: config.clone(),
        db,
        oauth,
        devices,
        homegraph,
    });

    // Build router
    let app = plangrove_home::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("plangrove_home=debug".parse().unwrap())
                .add_directive("info".parse().unwrap()),
        )
        .with(format)
        .init();
}
