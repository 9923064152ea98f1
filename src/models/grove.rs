// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Grove and plant documents, read from the main Plangrove collections.
//!
//! This service only consumes these: groves gate what a user may link, and
//! plants are projected into Smart Home devices. The single write path is
//! recording a watering event from an EXECUTE command.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::time_utils::parse_rfc3339;

/// A shared collection of plants.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Grove {
    /// Grove ID (also used as document ID)
    pub grove_id: String,
    pub name: String,
    pub owner_id: String,
    /// Users the grove is shared with (owner not repeated here)
    #[serde(default)]
    pub member_ids: Vec<String>,
    pub created_at: String,
}

impl Grove {
    /// Whether `user_id` may administer this grove (owner or member).
    pub fn is_member(&self, user_id: &str) -> bool {
        self.owner_id == user_id || self.member_ids.iter().any(|m| m == user_id)
    }
}

/// A tracked plant with a watering schedule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plant {
    /// Plant ID (also used as document ID)
    pub plant_id: String,
    pub grove_id: String,
    pub name: String,
    #[serde(default)]
    pub species: Option<String>,
    /// Days between waterings
    pub watering_interval_days: u32,
    /// When the plant was last watered (RFC3339), None if never
    #[serde(default)]
    pub last_watered_at: Option<String>,
    pub created_at: String,
}

impl Plant {
    /// Whether the plant counts as "watered" at `now`: its last watering is
    /// within the watering interval. This is the on/off state reported to
    /// Google for QUERY.
    pub fn is_watered(&self, now: DateTime<Utc>) -> bool {
        let Some(last) = self.last_watered_at.as_deref().and_then(parse_rfc3339) else {
            return false;
        };
        now - last < Duration::days(i64::from(self.watering_interval_days))
    }
}

/// A single watering event, appended when Google Home triggers a watering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WateringEvent {
    pub plant_id: String,
    pub grove_id: String,
    pub watered_at: String,
    /// What triggered the watering ("google_home" for this service)
    pub source: String,
}
