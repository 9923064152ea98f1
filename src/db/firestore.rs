// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Google Home link records (account-linking state + tokens)
//! - Authorization codes (single-use, consumed transactionally)
//! - Groves and plants (read-only projections for SYNC/QUERY)
//! - Watering events (written when EXECUTE triggers a watering)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{AuthorizationCode, GoogleHomeLink, Grove, Plant, WateringEvent};
use crate::time_utils::format_utc_rfc3339;
use chrono::{DateTime, Utc};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Link Record Operations ──────────────────────────────────

    /// Get the link record for a user.
    pub async fn get_link(&self, user_id: &str) -> Result<Option<GoogleHomeLink>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::LINKS)
            .obj()
            .one(user_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Find a link record by its current access token.
    pub async fn get_link_by_access_token(
        &self,
        access_token: &str,
    ) -> Result<Option<GoogleHomeLink>, AppError> {
        self.get_link_by_field("access_token", access_token).await
    }

    /// Find a link record by its refresh token.
    pub async fn get_link_by_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Option<GoogleHomeLink>, AppError> {
        self.get_link_by_field("refresh_token", refresh_token).await
    }

    async fn get_link_by_field(
        &self,
        field: &'static str,
        value: &str,
    ) -> Result<Option<GoogleHomeLink>, AppError> {
        // Empty token fields are placeholders on never-exchanged links and
        // must not match a lookup.
        if value.is_empty() {
            return Ok(None);
        }

        let value = value.to_string();
        let links: Vec<GoogleHomeLink> = self
            .get_client()?
            .fluent()
            .select()
            .from(collections::LINKS)
            .filter(move |q| q.field(field).eq(value.clone()))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(links.into_iter().next())
    }

    /// Create or update a link record.
    pub async fn upsert_link(&self, link: &GoogleHomeLink) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::LINKS)
            .document_id(&link.user_id)
            .object(link)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Delete a link record. Deleting a missing document succeeds, so
    /// unlink and DISCONNECT stay idempotent.
    pub async fn delete_link(&self, user_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::LINKS)
            .document_id(user_id)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    // ─── Authorization Code Operations ───────────────────────────

    /// Store a freshly minted authorization code.
    pub async fn create_auth_code(&self, code: &AuthorizationCode) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::AUTH_CODES)
            .document_id(&code.code)
            .object(code)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Atomically consume an authorization code: read it and delete it in a
    /// single transaction, so a code can never be exchanged twice even under
    /// concurrent attempts.
    ///
    /// Returns `None` when the code does not exist or another exchange won
    /// the race (the loser's commit fails on the conflicting delete).
    pub async fn consume_auth_code(
        &self,
        code: &str,
    ) -> Result<Option<AuthorizationCode>, AppError> {
        let client = self.get_client()?;

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        // Read within the transaction; registers the document for conflict
        // detection.
        let stored: Option<AuthorizationCode> = client
            .fluent()
            .select()
            .by_id_in(collections::AUTH_CODES)
            .obj()
            .one(code)
            .await
            .map_err(|e| AppError::Database(format!("Failed to read auth code: {}", e)))?;

        let Some(stored) = stored else {
            let _ = transaction.rollback().await;
            return Ok(None);
        };

        client
            .fluent()
            .delete()
            .from(collections::AUTH_CODES)
            .document_id(code)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add code deletion to transaction: {}", e))
            })?;

        if let Err(e) = transaction.commit().await {
            // A lost commit means a concurrent exchange consumed the code
            // first; surface it as "not found" so the caller rejects the
            // replay with invalid_grant.
            tracing::warn!(error = %e, "Auth code consumption commit failed");
            return Ok(None);
        }

        Ok(Some(stored))
    }

    // ─── Grove / Plant Operations ────────────────────────────────

    /// Get a grove by ID.
    pub async fn get_grove(&self, grove_id: &str) -> Result<Option<Grove>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::GROVES)
            .obj()
            .one(grove_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Store a grove document. The main app owns this collection; this
    /// service only writes it when seeding integration tests.
    pub async fn upsert_grove(&self, grove: &Grove) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::GROVES)
            .document_id(&grove.grove_id)
            .object(grove)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Store a plant document (integration-test seeding).
    pub async fn upsert_plant(&self, plant: &Plant) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::PLANTS)
            .document_id(&plant.plant_id)
            .object(plant)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// Get a plant by ID.
    pub async fn get_plant(&self, plant_id: &str) -> Result<Option<Plant>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::PLANTS)
            .obj()
            .one(plant_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get all plants in a grove, ordered by name for stable SYNC output.
    pub async fn get_plants_in_grove(&self, grove_id: &str) -> Result<Vec<Plant>, AppError> {
        let grove_id = grove_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::PLANTS)
            .filter(move |q| q.field("grove_id").eq(grove_id.clone()))
            .order_by([("name", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Watering Operations ─────────────────────────────────────

    /// Atomically record a watering: update the plant's `last_watered_at`
    /// and append a watering event in one transaction, so the event log and
    /// the plant state cannot diverge.
    pub async fn water_plant_atomic(
        &self,
        plant: &Plant,
        watered_at: DateTime<Utc>,
        source: &str,
    ) -> Result<(), AppError> {
        let client = self.get_client()?;
        let now = format_utc_rfc3339(watered_at);

        let mut updated = plant.clone();
        updated.last_watered_at = Some(now.clone());

        let event = WateringEvent {
            plant_id: plant.plant_id.clone(),
            grove_id: plant.grove_id.clone(),
            watered_at: now,
            source: source.to_string(),
        };
        let event_doc_id = format!("{}_{}", plant.plant_id, watered_at.timestamp_millis());

        let mut transaction = client
            .begin_transaction()
            .await
            .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

        client
            .fluent()
            .update()
            .in_col(collections::PLANTS)
            .document_id(&updated.plant_id)
            .object(&updated)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!("Failed to add plant update to transaction: {}", e))
            })?;

        client
            .fluent()
            .update()
            .in_col(collections::WATERINGS)
            .document_id(&event_doc_id)
            .object(&event)
            .add_to_transaction(&mut transaction)
            .map_err(|e| {
                AppError::Database(format!(
                    "Failed to add watering event to transaction: {}",
                    e
                ))
            })?;

        transaction
            .commit()
            .await
            .map_err(|e| AppError::Database(format!("Transaction commit failed: {}", e)))?;

        tracing::info!(
            plant_id = %plant.plant_id,
            grove_id = %plant.grove_id,
            source,
            "Watering recorded"
        );

        Ok(())
    }
}
