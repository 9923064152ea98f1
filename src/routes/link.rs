// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Link management endpoints for the Plangrove frontend.
//!
//! All routes here require a session (enforced in routes/mod.rs). The link
//! record's grove list is always deduplicated and limited to groves the
//! user administers.

use axum::{
    extract::State,
    routing::{get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{GoogleHomeLink, LinkView};
use crate::services::oauth::OAuthService;
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/link", post(create_link))
        .route("/status", get(link_status))
        .route("/unlink", post(unlink))
        .route("/update-groves", post(update_groves))
        .route("/request-sync", post(request_sync))
}

// ─── Link (consent completion) ───────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkRequest {
    #[serde(default)]
    grove_ids: Vec<String>,
    redirect_uri: Option<String>,
    state: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkResponse {
    pub success: bool,
    pub redirect_url: String,
}

/// Persist the user's grove selection and mint an authorization code.
/// Called from the grove-selection page, which performs the final redirect
/// itself, so this returns the URL instead of a 302.
async fn create_link(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<LinkRequest>,
) -> Result<Json<LinkResponse>> {
    let redirect_uri = request
        .redirect_uri
        .ok_or_else(|| AppError::BadRequest("Missing redirectUri".to_string()))?;
    let oauth_state = request
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state".to_string()))?;

    if request.grove_ids.is_empty() {
        return Err(AppError::BadRequest(
            "At least one grove must be selected".to_string(),
        ));
    }
    if !state.oauth.validate_redirect_uri(&redirect_uri) {
        return Err(AppError::BadRequest(
            "redirectUri is not registered".to_string(),
        ));
    }

    let grove_ids = validated_grove_ids(&state, &user.user_id, request.grove_ids).await?;

    upsert_grove_selection(&state, &user.user_id, grove_ids).await?;

    let code = state.oauth.mint_code(&user.user_id, &redirect_uri).await?;
    let redirect_url = format!(
        "{}?code={}&state={}",
        redirect_uri,
        code,
        urlencoding::encode(&oauth_state)
    );

    tracing::info!(user_id = %user.user_id, "Grove selection linked");

    Ok(Json(LinkResponse {
        success: true,
        redirect_url,
    }))
}

// ─── Status ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct StatusResponse {
    /// `null` when the user has never linked (a valid state, not an error)
    pub link: Option<LinkView>,
}

async fn link_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StatusResponse>> {
    let link = state.db.get_link(&user.user_id).await?;
    Ok(Json(StatusResponse {
        link: link.as_ref().map(LinkView::from),
    }))
}

// ─── Unlink ──────────────────────────────────────────────────

#[derive(Serialize)]
pub struct UnlinkResponse {
    pub success: bool,
    pub message: String,
}

/// Remove the Google Home connection. Idempotent.
async fn unlink(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<UnlinkResponse>> {
    state.db.delete_link(&user.user_id).await?;
    tracing::info!(user_id = %user.user_id, "Google Home link removed");

    Ok(Json(UnlinkResponse {
        success: true,
        message: "Google Home disconnected".to_string(),
    }))
}

// ─── Update groves ───────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateGrovesRequest {
    #[serde(default)]
    grove_ids: Vec<String>,
}

#[derive(Serialize)]
pub struct UpdateGrovesResponse {
    pub success: bool,
}

/// Overwrite the linked grove list. Creates the link record when absent.
async fn update_groves(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<UpdateGrovesRequest>,
) -> Result<Json<UpdateGrovesResponse>> {
    if request.grove_ids.is_empty() {
        return Err(AppError::BadRequest(
            "At least one grove must be selected".to_string(),
        ));
    }

    let grove_ids = validated_grove_ids(&state, &user.user_id, request.grove_ids).await?;

    let link = upsert_grove_selection(&state, &user.user_id, grove_ids).await?;

    // Device list changed; let Google know when the feature is configured.
    // Failures here must not fail the grove update itself.
    if state.homegraph.is_configured() {
        if let Err(e) = state.homegraph.request_sync(&link.agent_user_id).await {
            tracing::warn!(error = %e, user_id = %user.user_id, "Request-Sync after grove update failed");
        }
    }

    Ok(Json(UpdateGrovesResponse { success: true }))
}

// ─── Request-Sync ────────────────────────────────────────────

#[derive(Serialize)]
pub struct RequestSyncResponse {
    pub success: bool,
}

/// Explicitly ask Google to refresh the device list.
async fn request_sync(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<RequestSyncResponse>> {
    let link = state
        .db
        .get_link(&user.user_id)
        .await?
        .ok_or_else(|| AppError::NotFound("No Google Home link".to_string()))?;

    state.homegraph.request_sync(&link.agent_user_id).await?;

    Ok(Json(RequestSyncResponse { success: true }))
}

// ─── Helpers ─────────────────────────────────────────────────

/// Deduplicate the selection and confirm every grove exists and is
/// administered by the user.
async fn validated_grove_ids(
    state: &Arc<AppState>,
    user_id: &str,
    grove_ids: Vec<String>,
) -> Result<Vec<String>> {
    let grove_ids = dedupe(grove_ids);

    for grove_id in &grove_ids {
        let grove = state
            .db
            .get_grove(grove_id)
            .await?
            .ok_or_else(|| AppError::BadRequest(format!("Unknown grove: {}", grove_id)))?;

        if !grove.is_member(user_id) {
            return Err(AppError::BadRequest(format!(
                "Not a member of grove: {}",
                grove_id
            )));
        }
    }

    Ok(grove_ids)
}

/// Create or update the link record with a new grove selection. A link
/// created here carries placeholder empty tokens until the token exchange
/// completes.
async fn upsert_grove_selection(
    state: &Arc<AppState>,
    user_id: &str,
    grove_ids: Vec<String>,
) -> Result<GoogleHomeLink> {
    let now = format_utc_rfc3339(Utc::now());

    let link = match state.db.get_link(user_id).await? {
        Some(mut link) => {
            link.grove_ids = grove_ids;
            link.updated_at = now;
            link
        }
        None => GoogleHomeLink {
            user_id: user_id.to_string(),
            agent_user_id: OAuthService::agent_user_id(user_id),
            access_token: String::new(),
            refresh_token: String::new(),
            token_expires_at: String::new(),
            grove_ids,
            created_at: now.clone(),
            updated_at: now,
        },
    };

    state.db.upsert_link(&link).await?;
    Ok(link)
}

fn dedupe(grove_ids: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    grove_ids
        .into_iter()
        .filter(|id| seen.insert(id.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dedupe_preserves_order() {
        let ids = vec![
            "fern-grove-1".to_string(),
            "cactus-corner".to_string(),
            "fern-grove-1".to_string(),
        ];
        assert_eq!(
            dedupe(ids),
            vec!["fern-grove-1".to_string(), "cactus-corner".to_string()]
        );
    }
}
