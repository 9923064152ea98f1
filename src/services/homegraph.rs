// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Google HomeGraph API client (Request-Sync).
//!
//! Request-Sync tells Google to re-SYNC a user's device list after the set
//! of linked groves changes. The feature is optional; without an API key the
//! endpoint reports 501 and grove updates skip the call.

use crate::error::AppError;
use serde::Serialize;

const HOMEGRAPH_BASE_URL: &str = "https://homegraph.googleapis.com";

/// HomeGraph client wrapper.
#[derive(Clone)]
pub struct HomeGraphService {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RequestSyncBody<'a> {
    agent_user_id: &'a str,
}

impl HomeGraphService {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: HOMEGRAPH_BASE_URL.to_string(),
            api_key,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Ask Google to re-sync the device list for an agent user.
    pub async fn request_sync(&self, agent_user_id: &str) -> Result<(), AppError> {
        let Some(api_key) = &self.api_key else {
            return Err(AppError::NotConfigured(
                "HOMEGRAPH_API_KEY is not set".to_string(),
            ));
        };

        let url = format!("{}/v1/devices:requestSync?key={}", self.base_url, api_key);

        let response = self
            .http
            .post(&url)
            .json(&RequestSyncBody { agent_user_id })
            .send()
            .await
            .map_err(|e| AppError::HomeGraph(format!("Request-Sync request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::HomeGraph(format!("HTTP {}: {}", status, body)));
        }

        tracing::info!(agent_user_id, "HomeGraph Request-Sync sent");
        Ok(())
    }
}
