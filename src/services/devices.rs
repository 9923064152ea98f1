// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Plant-to-device projection for the Smart Home intents.
//!
//! SYNC and QUERY read plant state; EXECUTE is the one write path, recording
//! a watering through the shared plant collections.

use chrono::Utc;
use futures_util::{stream, StreamExt};
use std::collections::BTreeMap;

use crate::db::FirestoreDb;
use crate::error::AppError;
use crate::models::smart_home::{
    DeviceDescriptor, DeviceName, ExecuteCommand, ExecuteResult, Execution, QueryDeviceState,
    COMMAND_ON_OFF, DEVICE_TYPE_SPRINKLER, TRAIT_ON_OFF,
};
use crate::models::{GoogleHomeLink, Plant};

/// Concurrent watering commands per EXECUTE request.
const MAX_CONCURRENT_WATERINGS: usize = 8;

const ERROR_DEVICE_NOT_FOUND: &str = "deviceNotFound";
const ERROR_FUNCTION_NOT_SUPPORTED: &str = "functionNotSupported";
const ERROR_HARD: &str = "hardError";

/// Device projection and command execution.
#[derive(Clone)]
pub struct DeviceService {
    db: FirestoreDb,
}

impl DeviceService {
    pub fn new(db: FirestoreDb) -> Self {
        Self { db }
    }

    // ─── SYNC ────────────────────────────────────────────────────

    /// Project every plant in the link's groves into a device descriptor.
    /// A grove that has disappeared since linking is skipped, not an error.
    pub async fn sync_devices(
        &self,
        link: &GoogleHomeLink,
    ) -> Result<Vec<DeviceDescriptor>, AppError> {
        let mut devices = Vec::new();

        for grove_id in &link.grove_ids {
            let Some(grove) = self.db.get_grove(grove_id).await? else {
                tracing::warn!(grove_id, "Linked grove no longer exists, skipping");
                continue;
            };

            for plant in self.db.get_plants_in_grove(grove_id).await? {
                devices.push(project_device(&plant, &grove.name));
            }
        }

        Ok(devices)
    }

    // ─── QUERY ───────────────────────────────────────────────────

    /// Report per-device watered state. Unknown ids and plants outside the
    /// link's groves get a per-device error entry; the request never fails
    /// as a whole.
    pub async fn query_states(
        &self,
        link: &GoogleHomeLink,
        device_ids: &[String],
    ) -> Result<BTreeMap<String, QueryDeviceState>, AppError> {
        let now = Utc::now();
        let mut states = BTreeMap::new();

        for id in device_ids {
            let state = match self.load_authorized_plant(link, id).await? {
                Some(plant) => QueryDeviceState::success(plant.is_watered(now)),
                None => QueryDeviceState::error(ERROR_DEVICE_NOT_FOUND),
            };
            states.insert(id.clone(), state);
        }

        Ok(states)
    }

    // ─── EXECUTE ─────────────────────────────────────────────────

    /// Run watering commands against each targeted device concurrently,
    /// collecting per-device outcomes. Partial failure stays per-device.
    pub async fn execute(
        &self,
        link: &GoogleHomeLink,
        commands: &[ExecuteCommand],
    ) -> Result<Vec<ExecuteResult>, AppError> {
        let mut targets: Vec<(String, WateringRequest)> = Vec::new();
        for command in commands {
            let request = watering_request(&command.execution);
            for device in &command.devices {
                targets.push((device.id.clone(), request));
            }
        }

        let results: Vec<ExecuteResult> = stream::iter(targets)
            .map(|(device_id, request)| async move {
                self.execute_one(link, device_id, request).await
            })
            .buffer_unordered(MAX_CONCURRENT_WATERINGS)
            .collect()
            .await;

        Ok(results)
    }

    async fn execute_one(
        &self,
        link: &GoogleHomeLink,
        device_id: String,
        request: WateringRequest,
    ) -> ExecuteResult {
        let plant = match self.load_authorized_plant(link, &device_id).await {
            Ok(Some(plant)) => plant,
            Ok(None) => return ExecuteResult::error(device_id, ERROR_DEVICE_NOT_FOUND),
            Err(e) => {
                tracing::error!(error = %e, device_id, "Failed to load plant for EXECUTE");
                return ExecuteResult::error(device_id, ERROR_HARD);
            }
        };

        match request {
            WateringRequest::Water => {
                match self
                    .db
                    .water_plant_atomic(&plant, Utc::now(), "google_home")
                    .await
                {
                    Ok(()) => ExecuteResult::success(device_id),
                    Err(e) => {
                        tracing::error!(error = %e, device_id, "Failed to record watering");
                        ExecuteResult::error(device_id, ERROR_HARD)
                    }
                }
            }
            // Plants cannot be un-watered, and no other trait is exposed.
            WateringRequest::Unsupported => {
                ExecuteResult::error(device_id, ERROR_FUNCTION_NOT_SUPPORTED)
            }
        }
    }

    /// Fetch a plant and confirm it belongs to one of the link's groves.
    /// Plants outside the linked groves are reported as not found, so device
    /// ids cannot be probed across users.
    async fn load_authorized_plant(
        &self,
        link: &GoogleHomeLink,
        plant_id: &str,
    ) -> Result<Option<Plant>, AppError> {
        let Some(plant) = self.db.get_plant(plant_id).await? else {
            return Ok(None);
        };
        if !link.grove_ids.iter().any(|g| *g == plant.grove_id) {
            return Ok(None);
        }
        Ok(Some(plant))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum WateringRequest {
    Water,
    Unsupported,
}

/// Interpret an execution list: an OnOff command with `on: true` is a
/// watering trigger, everything else is unsupported.
fn watering_request(executions: &[Execution]) -> WateringRequest {
    for execution in executions {
        if execution.command == COMMAND_ON_OFF && execution.params.on == Some(true) {
            return WateringRequest::Water;
        }
    }
    WateringRequest::Unsupported
}

fn project_device(plant: &Plant, grove_name: &str) -> DeviceDescriptor {
    let mut nicknames = Vec::new();
    if let Some(species) = &plant.species {
        nicknames.push(species.clone());
    }

    DeviceDescriptor {
        id: plant.plant_id.clone(),
        device_type: DEVICE_TYPE_SPRINKLER.to_string(),
        traits: vec![TRAIT_ON_OFF.to_string()],
        name: DeviceName {
            default_names: vec!["Plangrove Plant".to_string()],
            name: plant.name.clone(),
            nicknames,
        },
        will_report_state: false,
        room_hint: Some(grove_name.to_string()),
    }
}
