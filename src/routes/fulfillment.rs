// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Smart Home fulfillment webhook.
//!
//! Google calls this single endpoint for every device operation. The handler
//! validates the bearer token, dispatches on the intent, and always answers
//! with a well-formed Smart Home JSON envelope, error cases included.

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use std::sync::Arc;

use crate::error::AppError;
use crate::models::smart_home::{
    ErrorPayload, ExecuteResponsePayload, FulfillmentResponse, IntentInput, QueryResponsePayload,
    SyncResponsePayload,
};
use crate::models::GoogleHomeLink;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/fulfillment", post(fulfillment))
}

async fn fulfillment(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    // Bearer validation comes before any body parsing; auth failures use an
    // empty requestId.
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "));

    let Some(bearer) = bearer else {
        return error_response(
            StatusCode::UNAUTHORIZED,
            "",
            "authExpired",
            "Missing bearer token",
        );
    };

    let link = match state.oauth.authenticate_bearer(bearer).await {
        Ok(link) => link,
        Err(AppError::InvalidToken) => {
            return error_response(
                StatusCode::UNAUTHORIZED,
                "",
                "authExpired",
                "Access token is invalid or expired",
            );
        }
        Err(e) => {
            tracing::error!(error = %e, "Bearer validation failed");
            return error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "",
                "unknownError",
                "Internal error",
            );
        }
    };

    let Ok(envelope) = serde_json::from_slice::<serde_json::Value>(&body) else {
        return error_response(
            StatusCode::BAD_REQUEST,
            "",
            "protocolError",
            "Request body is not valid JSON",
        );
    };

    let request_id = envelope
        .get("requestId")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let Some(first_input) = envelope
        .get("inputs")
        .and_then(|v| v.as_array())
        .and_then(|inputs| inputs.first())
    else {
        return error_response(
            StatusCode::BAD_REQUEST,
            &request_id,
            "protocolError",
            "Request has no inputs",
        );
    };

    let intent: IntentInput = match serde_json::from_value(first_input.clone()) {
        Ok(intent) => intent,
        Err(e) => {
            tracing::warn!(error = %e, "Unrecognized fulfillment intent");
            return error_response(
                StatusCode::BAD_REQUEST,
                &request_id,
                "notSupported",
                "Unrecognized intent",
            );
        }
    };

    // Nothing past this point may escape as a raw error; Google always gets
    // the JSON envelope.
    match dispatch(&state, &link, &request_id, intent).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, request_id = %request_id, "Fulfillment handler failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                &request_id,
                "unknownError",
                "Internal error",
            )
        }
    }
}

async fn dispatch(
    state: &Arc<AppState>,
    link: &GoogleHomeLink,
    request_id: &str,
    intent: IntentInput,
) -> Result<Response, AppError> {
    match intent {
        IntentInput::Sync => {
            let devices = state.devices.sync_devices(link).await?;
            tracing::info!(
                user_id = %link.user_id,
                device_count = devices.len(),
                "SYNC handled"
            );
            Ok(Json(FulfillmentResponse {
                request_id: request_id.to_string(),
                payload: SyncResponsePayload {
                    agent_user_id: link.agent_user_id.clone(),
                    devices,
                },
            })
            .into_response())
        }

        IntentInput::Query { payload } => {
            let ids: Vec<String> = payload.devices.into_iter().map(|d| d.id).collect();
            let devices = state.devices.query_states(link, &ids).await?;
            Ok(Json(FulfillmentResponse {
                request_id: request_id.to_string(),
                payload: QueryResponsePayload { devices },
            })
            .into_response())
        }

        IntentInput::Execute { payload } => {
            let commands = state.devices.execute(link, &payload.commands).await?;
            tracing::info!(
                user_id = %link.user_id,
                command_count = commands.len(),
                "EXECUTE handled"
            );
            Ok(Json(FulfillmentResponse {
                request_id: request_id.to_string(),
                payload: ExecuteResponsePayload { commands },
            })
            .into_response())
        }

        IntentInput::Disconnect => {
            // Idempotent: deleting an already-deleted link still succeeds.
            state.db.delete_link(&link.user_id).await?;
            tracing::info!(user_id = %link.user_id, "DISCONNECT handled, link removed");
            Ok(Json(serde_json::json!({})).into_response())
        }
    }
}

fn error_response(
    status: StatusCode,
    request_id: &str,
    error_code: &str,
    debug_string: &str,
) -> Response {
    (
        status,
        Json(FulfillmentResponse {
            request_id: request_id.to_string(),
            payload: ErrorPayload {
                error_code: error_code.to_string(),
                debug_string: Some(debug_string.to_string()),
            },
        }),
    )
        .into_response()
}
