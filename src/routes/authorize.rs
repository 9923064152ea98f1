// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth authorization endpoint for Google Home account linking.
//!
//! Front-channel step of the authorization-code grant: Google sends the user
//! here; we validate the request, make sure the user is logged in, and either
//! short-circuit with a code (already linked) or bounce through the grove
//! selection page.

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    response::Redirect,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::middleware::auth::session_user;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth", get(authorize))
}

/// Query parameters of the authorize request. All fields are optional at the
/// type level so missing parameters produce a 400 JSON error, never a 422 or
/// a redirect.
#[derive(Deserialize)]
pub struct AuthorizeParams {
    client_id: Option<String>,
    redirect_uri: Option<String>,
    state: Option<String>,
    response_type: Option<String>,
}

async fn authorize(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Query(params): Query<AuthorizeParams>,
) -> Result<Redirect> {
    let client_id = params
        .client_id
        .ok_or_else(|| AppError::BadRequest("Missing client_id".to_string()))?;
    let redirect_uri = params
        .redirect_uri
        .ok_or_else(|| AppError::BadRequest("Missing redirect_uri".to_string()))?;
    let oauth_state = params
        .state
        .ok_or_else(|| AppError::BadRequest("Missing state".to_string()))?;
    let response_type = params
        .response_type
        .ok_or_else(|| AppError::BadRequest("Missing response_type".to_string()))?;

    if response_type != "code" {
        return Err(AppError::BadRequest(format!(
            "Unsupported response_type: {}",
            response_type
        )));
    }
    if !state.oauth.validate_client_id(&client_id) {
        return Err(AppError::BadRequest("Unknown client_id".to_string()));
    }
    if !state.oauth.validate_redirect_uri(&redirect_uri) {
        return Err(AppError::BadRequest(
            "redirect_uri is not registered".to_string(),
        ));
    }

    // Not logged in: send to the login page with the original authorize URL
    // as the return target so the flow resumes (and re-validates) afterwards.
    let Some(user) = session_user(&jar, &headers, &state.config.jwt_signing_key) else {
        let return_to = format!(
            "/auth?client_id={}&redirect_uri={}&state={}&response_type=code",
            urlencoding::encode(&client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&oauth_state),
        );
        let login_url = format!(
            "{}/login?return_to={}",
            state.config.frontend_url,
            urlencoding::encode(&return_to)
        );
        tracing::info!("Authorize request without session, redirecting to login");
        return Ok(Redirect::temporary(&login_url));
    };

    // Already linked with at least one grove: skip the consent page and hand
    // Google a fresh code immediately.
    if let Some(link) = state.db.get_link(&user.user_id).await? {
        if !link.grove_ids.is_empty() {
            let code = state.oauth.mint_code(&user.user_id, &redirect_uri).await?;
            let callback = format!(
                "{}?code={}&state={}",
                redirect_uri,
                code,
                urlencoding::encode(&oauth_state)
            );
            tracing::info!(user_id = %user.user_id, "Existing link, skipping consent");
            return Ok(Redirect::temporary(&callback));
        }
    }

    // First-time linking: send to the grove selection page, carrying the
    // OAuth parameters through so /link can finish the flow.
    let consent_url = format!(
        "{}/google-home/link?redirect_uri={}&state={}",
        state.config.frontend_url,
        urlencoding::encode(&redirect_uri),
        urlencoding::encode(&oauth_state)
    );
    tracing::info!(user_id = %user.user_id, "Redirecting to grove selection");
    Ok(Redirect::temporary(&consent_url))
}
