// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth 2.0 authorization-server logic for Google Home account linking.
//!
//! Handles:
//! - Authorization code minting (front channel, after consent)
//! - Code-for-token exchange with single-use enforcement
//! - Access token refresh (refresh tokens are not rotated)
//! - Bearer token validation for the fulfillment webhook

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::{AuthorizationCode, GoogleHomeLink};
use crate::time_utils::format_utc_rfc3339;

/// Access tokens live one hour.
pub const ACCESS_TOKEN_TTL_SECS: i64 = 60 * 60;
/// Authorization codes live ten minutes and are single-use.
const AUTH_CODE_TTL_SECS: i64 = 10 * 60;
const TOKEN_BYTES: usize = 32;

/// OAuth engine, shared across handlers via `AppState`.
#[derive(Clone)]
pub struct OAuthService {
    db: FirestoreDb,
    client_id: String,
    client_secret: String,
    allowed_redirect_uris: Vec<String>,
    rng: SystemRandom,
}

/// Token endpoint success body (RFC 6749 §5.1).
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token_type: String,
    pub access_token: String,
    /// Present only on authorization_code exchanges; refresh responses
    /// never carry a new refresh token.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    pub expires_in: i64,
}

/// Token endpoint failures (RFC 6749 §5.2).
#[derive(Debug, thiserror::Error)]
pub enum OAuthError {
    #[error("invalid_request: {0}")]
    InvalidRequest(String),

    #[error("invalid_client: {0}")]
    InvalidClient(String),

    #[error("invalid_grant: {0}")]
    InvalidGrant(String),

    #[error("unsupported_grant_type: {0}")]
    UnsupportedGrantType(String),

    #[error(transparent)]
    Internal(#[from] AppError),
}

#[derive(Serialize)]
struct OAuthErrorBody {
    error: String,
    error_description: String,
}

impl IntoResponse for OAuthError {
    fn into_response(self) -> Response {
        let (status, error, description) = match self {
            OAuthError::InvalidRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_request", msg),
            OAuthError::InvalidClient(msg) => (StatusCode::UNAUTHORIZED, "invalid_client", msg),
            OAuthError::InvalidGrant(msg) => (StatusCode::BAD_REQUEST, "invalid_grant", msg),
            OAuthError::UnsupportedGrantType(msg) => {
                (StatusCode::BAD_REQUEST, "unsupported_grant_type", msg)
            }
            OAuthError::Internal(err) => {
                tracing::error!(error = %err, "Token endpoint internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "server_error",
                    "internal error".to_string(),
                )
            }
        };

        let body = OAuthErrorBody {
            error: error.to_string(),
            error_description: description,
        };

        // Token responses must not be cached (RFC 6749 §5.1/§5.2).
        (
            status,
            [
                (header::CACHE_CONTROL, "no-store"),
                (header::PRAGMA, "no-cache"),
            ],
            Json(body),
        )
            .into_response()
    }
}

impl OAuthService {
    pub fn new(db: FirestoreDb, config: &Config) -> Self {
        Self {
            db,
            client_id: config.google_client_id.clone(),
            client_secret: config.google_client_secret.clone(),
            allowed_redirect_uris: config.allowed_redirect_uris.clone(),
            rng: SystemRandom::new(),
        }
    }

    // ─── Validation ──────────────────────────────────────────────

    pub fn validate_client_id(&self, client_id: &str) -> bool {
        client_id == self.client_id
    }

    /// Redirect URIs must exactly match a registered callback. Anything else
    /// is rejected up front so the authorize endpoint can never be used as an
    /// open redirector.
    pub fn validate_redirect_uri(&self, redirect_uri: &str) -> bool {
        if url::Url::parse(redirect_uri).is_err() {
            return false;
        }
        self.allowed_redirect_uris
            .iter()
            .any(|allowed| allowed == redirect_uri)
    }

    /// Check client credentials when the client presents them. Google sends
    /// `client_id`/`client_secret` in every token request; a mismatch is a
    /// misconfigured or hostile client.
    pub fn validate_client_credentials(
        &self,
        client_id: Option<&str>,
        client_secret: Option<&str>,
    ) -> Result<(), OAuthError> {
        if let Some(id) = client_id {
            if id != self.client_id {
                return Err(OAuthError::InvalidClient("unknown client_id".to_string()));
            }
        }
        if let Some(secret) = client_secret {
            if secret != self.client_secret {
                return Err(OAuthError::InvalidClient(
                    "client authentication failed".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Derive the externally-visible agent user ID from a Plangrove user ID.
    /// Google stores this value; the raw user ID never leaves our systems.
    pub fn agent_user_id(user_id: &str) -> String {
        let digest = Sha256::digest(user_id.as_bytes());
        hex::encode(digest)[..32].to_string()
    }

    fn generate_token(&self) -> Result<String, AppError> {
        let mut bytes = [0u8; TOKEN_BYTES];
        self.rng
            .fill(&mut bytes)
            .map_err(|_| AppError::Internal(anyhow::anyhow!("system RNG failure")))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    // ─── Authorization codes ─────────────────────────────────────

    /// Mint a single-use authorization code bound to the user and the
    /// redirect URI it must be exchanged with.
    pub async fn mint_code(&self, user_id: &str, redirect_uri: &str) -> Result<String, AppError> {
        let now = Utc::now();
        let code = self.generate_token()?;

        self.db
            .create_auth_code(&AuthorizationCode {
                code: code.clone(),
                user_id: user_id.to_string(),
                redirect_uri: redirect_uri.to_string(),
                created_at: format_utc_rfc3339(now),
                expires_at: format_utc_rfc3339(now + Duration::seconds(AUTH_CODE_TTL_SECS)),
            })
            .await?;

        tracing::info!(user_id, "Authorization code minted");
        Ok(code)
    }

    // ─── Token exchange ──────────────────────────────────────────

    /// Exchange an authorization code for a fresh access/refresh token pair.
    /// The code is consumed atomically; a second exchange of the same code
    /// fails with `invalid_grant`.
    pub async fn exchange_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let stored = self
            .db
            .consume_auth_code(code)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("authorization code is invalid".to_string()))?;

        let now = Utc::now();
        if stored.is_expired(now) {
            return Err(OAuthError::InvalidGrant(
                "authorization code has expired".to_string(),
            ));
        }
        if stored.redirect_uri != redirect_uri {
            return Err(OAuthError::InvalidGrant(
                "redirect_uri does not match the authorization request".to_string(),
            ));
        }

        // The link record is created at grove selection, before any exchange.
        let mut link = self
            .db
            .get_link(&stored.user_id)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("no linked groves for user".to_string()))?;

        let access_token = self.generate_token()?;
        let refresh_token = self.generate_token()?;

        link.access_token = access_token.clone();
        link.refresh_token = refresh_token.clone();
        link.token_expires_at =
            format_utc_rfc3339(now + Duration::seconds(ACCESS_TOKEN_TTL_SECS));
        link.updated_at = format_utc_rfc3339(now);

        self.db.upsert_link(&link).await?;

        tracing::info!(user_id = %link.user_id, "Authorization code exchanged for tokens");

        Ok(TokenResponse {
            token_type: "Bearer".to_string(),
            access_token,
            refresh_token: Some(refresh_token),
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    /// Mint a new access token from a refresh token. The refresh token stays
    /// valid and is not returned again.
    pub async fn refresh_access_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenResponse, OAuthError> {
        let mut link = self
            .db
            .get_link_by_refresh_token(refresh_token)
            .await?
            .ok_or_else(|| OAuthError::InvalidGrant("refresh token is invalid".to_string()))?;

        let now = Utc::now();
        let access_token = self.generate_token()?;

        link.access_token = access_token.clone();
        link.token_expires_at =
            format_utc_rfc3339(now + Duration::seconds(ACCESS_TOKEN_TTL_SECS));
        link.updated_at = format_utc_rfc3339(now);

        self.db.upsert_link(&link).await?;

        tracing::info!(user_id = %link.user_id, "Access token refreshed");

        Ok(TokenResponse {
            token_type: "Bearer".to_string(),
            access_token,
            refresh_token: None,
            expires_in: ACCESS_TOKEN_TTL_SECS,
        })
    }

    // ─── Bearer validation ───────────────────────────────────────

    /// Resolve a fulfillment bearer token to its link record. Expired or
    /// unknown tokens fail with `InvalidToken`.
    pub async fn authenticate_bearer(&self, token: &str) -> Result<GoogleHomeLink, AppError> {
        if token.is_empty() {
            return Err(AppError::InvalidToken);
        }

        let link = self
            .db
            .get_link_by_access_token(token)
            .await?
            .ok_or(AppError::InvalidToken)?;

        if !link.has_live_access_token(Utc::now()) {
            return Err(AppError::InvalidToken);
        }

        Ok(link)
    }
}
