// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Typed Google Smart Home fulfillment payloads.
//!
//! Requests arrive as `{requestId, inputs: [{intent, payload?}]}`; the intent
//! is modeled as a tagged union so the dispatcher match is exhaustive.
//! Responses serialize camelCase per the Smart Home wire format.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEVICE_TYPE_SPRINKLER: &str = "action.devices.types.SPRINKLER";
pub const TRAIT_ON_OFF: &str = "action.devices.traits.OnOff";
pub const COMMAND_ON_OFF: &str = "action.devices.commands.OnOff";

// ─── Requests ────────────────────────────────────────────────

/// One entry of the request's `inputs` array, dispatched on `intent`.
#[derive(Debug, Deserialize)]
#[serde(tag = "intent")]
pub enum IntentInput {
    #[serde(rename = "action.devices.SYNC")]
    Sync,
    #[serde(rename = "action.devices.QUERY")]
    Query { payload: QueryPayload },
    #[serde(rename = "action.devices.EXECUTE")]
    Execute { payload: ExecutePayload },
    #[serde(rename = "action.devices.DISCONNECT")]
    Disconnect,
}

#[derive(Debug, Deserialize)]
pub struct QueryPayload {
    pub devices: Vec<DeviceRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceRef {
    pub id: String,
}

#[derive(Debug, Deserialize)]
pub struct ExecutePayload {
    pub commands: Vec<ExecuteCommand>,
}

#[derive(Debug, Deserialize)]
pub struct ExecuteCommand {
    pub devices: Vec<DeviceRef>,
    pub execution: Vec<Execution>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Execution {
    pub command: String,
    #[serde(default)]
    pub params: ExecutionParams,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutionParams {
    #[serde(default)]
    pub on: Option<bool>,
}

// ─── Responses ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FulfillmentResponse<P: Serialize> {
    pub request_id: String,
    pub payload: P,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncResponsePayload {
    pub agent_user_id: String,
    pub devices: Vec<DeviceDescriptor>,
}

/// One plant projected as a Smart Home device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub id: String,
    #[serde(rename = "type")]
    pub device_type: String,
    pub traits: Vec<String>,
    pub name: DeviceName,
    pub will_report_state: bool,
    /// Grove name, so devices group sensibly in the Google Home app
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room_hint: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceName {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub default_names: Vec<String>,
    pub name: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub nicknames: Vec<String>,
}

/// QUERY responses keep a per-device map; unknown devices get an ERROR entry
/// instead of failing the request.
#[derive(Debug, Serialize)]
pub struct QueryResponsePayload {
    pub devices: BTreeMap<String, QueryDeviceState>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDeviceState {
    pub status: String,
    pub online: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl QueryDeviceState {
    pub fn success(on: bool) -> Self {
        Self {
            status: "SUCCESS".to_string(),
            online: true,
            on: Some(on),
            error_code: None,
        }
    }

    pub fn error(code: &str) -> Self {
        Self {
            status: "ERROR".to_string(),
            online: false,
            on: None,
            error_code: Some(code.to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ExecuteResponsePayload {
    pub commands: Vec<ExecuteResult>,
}

/// Outcome for a single device; partial failure stays per-device.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteResult {
    pub ids: Vec<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<ExecuteStates>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteStates {
    pub on: bool,
    pub online: bool,
}

impl ExecuteResult {
    pub fn success(id: String) -> Self {
        Self {
            ids: vec![id],
            status: "SUCCESS".to_string(),
            states: Some(ExecuteStates {
                on: true,
                online: true,
            }),
            error_code: None,
        }
    }

    pub fn error(id: String, code: &str) -> Self {
        Self {
            ids: vec![id],
            status: "ERROR".to_string(),
            states: None,
            error_code: Some(code.to_string()),
        }
    }
}

/// Error envelope Google expects on any failure.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub error_code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug_string: Option<String>,
}
