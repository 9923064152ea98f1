// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! OAuth token endpoint (back channel, called server-to-server by Google).

use axum::{
    body::Bytes,
    extract::State,
    http::{header, HeaderMap},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

use crate::services::oauth::OAuthError;
use crate::AppState;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/token", post(token))
}

/// Token request fields, common to both grant types. Google sends these
/// form-encoded, but JSON bodies are accepted too.
#[derive(Debug, Default, Deserialize)]
pub struct TokenRequest {
    pub grant_type: Option<String>,
    pub code: Option<String>,
    pub redirect_uri: Option<String>,
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
}

async fn token(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, OAuthError> {
    let request = parse_token_request(&headers, &body)?;

    state.oauth.validate_client_credentials(
        request.client_id.as_deref(),
        request.client_secret.as_deref(),
    )?;

    let grant_type = request
        .grant_type
        .as_deref()
        .ok_or_else(|| OAuthError::InvalidRequest("Missing grant_type".to_string()))?;

    let response = match grant_type {
        "authorization_code" => {
            let code = request
                .code
                .as_deref()
                .ok_or_else(|| OAuthError::InvalidRequest("Missing code".to_string()))?;
            let redirect_uri = request
                .redirect_uri
                .as_deref()
                .ok_or_else(|| OAuthError::InvalidRequest("Missing redirect_uri".to_string()))?;

            state.oauth.exchange_code(code, redirect_uri).await?
        }
        "refresh_token" => {
            let refresh_token = request
                .refresh_token
                .as_deref()
                .ok_or_else(|| OAuthError::InvalidRequest("Missing refresh_token".to_string()))?;

            state.oauth.refresh_access_token(refresh_token).await?
        }
        other => {
            return Err(OAuthError::UnsupportedGrantType(format!(
                "Unsupported grant_type: {}",
                other
            )));
        }
    };

    // Token responses must not be cached (RFC 6749 §5.1).
    Ok((
        [
            (header::CACHE_CONTROL, "no-store"),
            (header::PRAGMA, "no-cache"),
        ],
        Json(response),
    )
        .into_response())
}

/// Parse the request body according to its content type. Google uses
/// form encoding; JSON is supported for in-app callers. Anything else
/// is a protocol error.
fn parse_token_request(headers: &HeaderMap, body: &[u8]) -> Result<TokenRequest, OAuthError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    if content_type.starts_with("application/x-www-form-urlencoded") {
        let mut request = TokenRequest::default();
        for (key, value) in url::form_urlencoded::parse(body) {
            let value = value.into_owned();
            match key.as_ref() {
                "grant_type" => request.grant_type = Some(value),
                "code" => request.code = Some(value),
                "redirect_uri" => request.redirect_uri = Some(value),
                "refresh_token" => request.refresh_token = Some(value),
                "client_id" => request.client_id = Some(value),
                "client_secret" => request.client_secret = Some(value),
                _ => {}
            }
        }
        Ok(request)
    } else if content_type.starts_with("application/json") {
        serde_json::from_slice(body)
            .map_err(|e| OAuthError::InvalidRequest(format!("Malformed JSON body: {}", e)))
    } else {
        Err(OAuthError::InvalidRequest(format!(
            "Unsupported content type: {}",
            content_type
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            "application/x-www-form-urlencoded".parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_parse_form_body() {
        let body = b"grant_type=authorization_code&code=abc123&redirect_uri=https%3A%2F%2Fexample.com%2Fcb";
        let request = parse_token_request(&form_headers(), body).unwrap();
        assert_eq!(request.grant_type.as_deref(), Some("authorization_code"));
        assert_eq!(request.code.as_deref(), Some("abc123"));
        assert_eq!(
            request.redirect_uri.as_deref(),
            Some("https://example.com/cb")
        );
    }

    #[test]
    fn test_parse_json_body() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "application/json".parse().unwrap());
        let body = br#"{"grant_type": "refresh_token", "refresh_token": "r-1"}"#;
        let request = parse_token_request(&headers, body).unwrap();
        assert_eq!(request.grant_type.as_deref(), Some("refresh_token"));
        assert_eq!(request.refresh_token.as_deref(), Some("r-1"));
    }

    #[test]
    fn test_unsupported_content_type() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, "text/plain".parse().unwrap());
        let result = parse_token_request(&headers, b"grant_type=authorization_code");
        assert!(matches!(result, Err(OAuthError::InvalidRequest(_))));
    }

    #[test]
    fn test_unknown_form_fields_ignored() {
        let body = b"grant_type=refresh_token&refresh_token=r-1&scope=ignored";
        let request = parse_token_request(&form_headers(), body).unwrap();
        assert_eq!(request.refresh_token.as_deref(), Some("r-1"));
    }
}
