// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google Home link records and authorization codes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::parse_rfc3339;

/// Per-user Google Home account-linking state, stored in Firestore.
///
/// Token fields are empty strings until the first token exchange completes;
/// a link may carry groves before any OAuth handshake has finished.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoogleHomeLink {
    /// Plangrove user ID (also used as document ID)
    pub user_id: String,
    /// Externally-visible agent user ID reported to Google (derived from
    /// the user ID, never the raw ID itself)
    pub agent_user_id: String,
    /// Current OAuth access token (opaque bearer, empty until issued)
    pub access_token: String,
    /// Long-lived refresh token (empty until issued)
    pub refresh_token: String,
    /// Access token expiry (RFC3339, empty until issued)
    pub token_expires_at: String,
    /// Groves exposed to Google Home (deduplicated)
    pub grove_ids: Vec<String>,
    /// When the link was first created
    pub created_at: String,
    /// Last mutation timestamp
    pub updated_at: String,
}

impl GoogleHomeLink {
    /// Whether the stored access token is still usable at `now`.
    pub fn has_live_access_token(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match parse_rfc3339(&self.token_expires_at) {
            Some(expires_at) => now < expires_at,
            None => false,
        }
    }
}

/// Short-lived single-use authorization code, stored keyed by the code value
/// and deleted transactionally on exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub user_id: String,
    /// Redirect URI the code was issued for; the exchange must present
    /// the same URI
    pub redirect_uri: String,
    pub created_at: String,
    pub expires_at: String,
}

impl AuthorizationCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match parse_rfc3339(&self.expires_at) {
            Some(expires_at) => now >= expires_at,
            None => true,
        }
    }
}

/// Link state as exposed to the frontend. Never carries token material.
#[derive(Debug, Clone, Serialize)]
pub struct LinkView {
    pub agent_user_id: String,
    pub grove_ids: Vec<String>,
    /// True once a token exchange has completed (tokens exist)
    pub linked: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<&GoogleHomeLink> for LinkView {
    fn from(link: &GoogleHomeLink) -> Self {
        Self {
            agent_user_id: link.agent_user_id.clone(),
            grove_ids: link.grove_ids.clone(),
            linked: !link.refresh_token.is_empty(),
            created_at: link.created_at.clone(),
            updated_at: link.updated_at.clone(),
        }
    }
}
