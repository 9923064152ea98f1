// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Secrets are injected as environment variables by the deployment (Cloud Run
//! secret bindings), so everything is read once at startup and cached here.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// OAuth client ID Google presents during account linking (public)
    pub google_client_id: String,
    /// Allow-listed OAuth redirect URIs (Google's redirect endpoints)
    pub allowed_redirect_uris: Vec<String>,
    /// Frontend URL for login and grove-selection redirects
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,

    // --- Secrets ---
    /// OAuth client secret Google sends to the token endpoint
    pub google_client_secret: String,
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HomeGraph API key for Request-Sync calls (optional feature)
    pub homegraph_api_key: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let gcp_project_id = env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string());

        // Google's account-linking redirect endpoints for this project.
        // GOOGLE_HOME_REDIRECT_URIS overrides for non-standard setups.
        let allowed_redirect_uris = match env::var("GOOGLE_HOME_REDIRECT_URIS") {
            Ok(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => vec![
                format!(
                    "https://oauth-redirect.googleusercontent.com/r/{}",
                    gcp_project_id
                ),
                format!(
                    "https://oauth-redirect-sandbox.googleusercontent.com/r/{}",
                    gcp_project_id
                ),
            ],
        };

        Ok(Self {
            google_client_id: env::var("GOOGLE_HOME_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("GOOGLE_HOME_CLIENT_ID"))?,
            allowed_redirect_uris,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id,
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),

            google_client_secret: env::var("GOOGLE_HOME_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("GOOGLE_HOME_CLIENT_SECRET"))?,
            jwt_signing_key: env::var("JWT_SIGNING_KEY")
                .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
                .into_bytes(),
            homegraph_api_key: env::var("HOMEGRAPH_API_KEY")
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty()),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            google_client_id: "test-google-client".to_string(),
            allowed_redirect_uris: vec![
                "https://oauth-redirect.googleusercontent.com/r/test-project".to_string(),
            ],
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            google_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            homegraph_api_key: None,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),
}
