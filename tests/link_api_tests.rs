// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Link management API validation tests.

use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
};
use tower::ServiceExt;

mod common;

const GOOD_REDIRECT: &str = "https://oauth-redirect.googleusercontent.com/r/test-project";

async fn post_json(
    app: axum::Router,
    uri: &str,
    token: Option<&str>,
    body: &str,
) -> axum::response::Response {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    app.oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_all_link_routes_require_session() {
    for (method, uri) in [
        (Method::POST, "/link"),
        (Method::GET, "/status"),
        (Method::POST, "/unlink"),
        (Method::POST, "/update-groves"),
        (Method::POST, "/request-sync"),
    ] {
        let (app, _) = common::create_test_app();
        let mut builder = Request::builder().method(method.clone()).uri(uri);
        if method == Method::POST {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
        }
        let response = app
            .oneshot(builder.body(Body::from("{}")).unwrap())
            .await
            .unwrap();
        assert_eq!(
            response.status(),
            StatusCode::UNAUTHORIZED,
            "expected 401 for {} {}",
            method,
            uri
        );
    }
}

#[tokio::test]
async fn test_link_requires_redirect_uri() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let body = r#"{"groveIds": ["fern-grove-1"], "state": "abc123"}"#;
    let response = post_json(app, "/link", Some(&token), body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_link_rejects_empty_grove_list() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let body = format!(
        r#"{{"groveIds": [], "redirectUri": "{}", "state": "abc123"}}"#,
        GOOD_REDIRECT
    );
    let response = post_json(app, "/link", Some(&token), &body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = common::body_json(response).await;
    assert_eq!(json["error"], "bad_request");
}

#[tokio::test]
async fn test_link_rejects_unregistered_redirect_uri() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let body = r#"{"groveIds": ["fern-grove-1"], "redirectUri": "https://evil.example.com/cb", "state": "abc123"}"#;
    let response = post_json(app, "/link", Some(&token), body).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_groves_rejects_empty_list() {
    let (app, state) = common::create_test_app();
    let token = common::create_test_jwt("user-1", &state.config.jwt_signing_key);

    let response = post_json(app, "/update-groves", Some(&token), r#"{"groveIds": []}"#).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
