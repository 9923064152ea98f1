// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end account-linking flow against the Firestore emulator.
//!
//! Run with FIRESTORE_EMULATOR_HOST set; skipped otherwise.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use chrono::Utc;
use plangrove_home::models::Grove;
use plangrove_home::time_utils::format_utc_rfc3339;
use tower::ServiceExt;

mod common;

const GOOD_REDIRECT: &str = "https://oauth-redirect.googleusercontent.com/r/test-project";

fn unique(prefix: &str) -> String {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_nanos();
    format!("{}-{}", prefix, nanos)
}

async fn seed_grove(db: &plangrove_home::db::FirestoreDb, owner_id: &str) -> String {
    let grove_id = unique("grove");
    db.upsert_grove(&Grove {
        grove_id: grove_id.clone(),
        name: "Office Ferns".to_string(),
        owner_id: owner_id.to_string(),
        member_ids: vec![],
        created_at: format_utc_rfc3339(Utc::now()),
    })
    .await
    .expect("Failed to seed grove");
    grove_id
}

async fn post_json(
    app: axum::Router,
    uri: &str,
    session: &str,
    body: serde_json::Value,
) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, format!("Bearer {}", session))
            .body(Body::from(body.to_string()))
            .unwrap(),
    )
    .await
    .unwrap()
}

async fn post_token_form(app: axum::Router, body: String) -> axum::response::Response {
    app.oneshot(
        Request::builder()
            .method("POST")
            .uri("/token")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(body))
            .unwrap(),
    )
    .await
    .unwrap()
}

/// Pull a query parameter out of a redirect URL.
fn query_param(redirect_url: &str, key: &str) -> Option<String> {
    let parsed = url::Url::parse(redirect_url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.into_owned())
}

#[tokio::test]
async fn test_link_then_exchange_then_replay_then_refresh() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_app_with_db(db.clone());
    let user_id = unique("user");
    let grove_id = seed_grove(&db, &user_id).await;
    let session = common::create_test_jwt(&user_id, &state.config.jwt_signing_key);

    // 1. Grove selection mints a code and returns the callback URL.
    let response = post_json(
        app.clone(),
        "/link",
        &session,
        serde_json::json!({
            "groveIds": [grove_id],
            "redirectUri": GOOD_REDIRECT,
            "state": "abc123",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = common::body_json(response).await;
    assert_eq!(body["success"], true);

    let redirect_url = body["redirectUrl"].as_str().unwrap();
    assert!(redirect_url.starts_with(GOOD_REDIRECT));
    assert_eq!(query_param(redirect_url, "state").as_deref(), Some("abc123"));
    let code = query_param(redirect_url, "code").expect("redirectUrl carries a code");

    // 2. Back-channel exchange returns a fresh token pair.
    let form = format!(
        "grant_type=authorization_code&code={}&redirect_uri={}",
        code,
        urlencoding::encode(GOOD_REDIRECT)
    );
    let response = post_token_form(app.clone(), form.clone()).await;
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = common::body_json(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 3600);
    assert!(tokens["access_token"].is_string());
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    // 3. The code is single-use: replay fails with invalid_grant.
    let response = post_token_form(app.clone(), form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_grant");

    // 4. Refresh mints an access token but never a new refresh token.
    let form = format!("grant_type=refresh_token&refresh_token={}", refresh_token);
    let response = post_token_form(app.clone(), form).await;
    assert_eq!(response.status(), StatusCode::OK);
    let refreshed = common::body_json(response).await;
    assert!(refreshed["access_token"].is_string());
    assert_ne!(refreshed["access_token"], tokens["access_token"]);
    assert!(refreshed.get("refresh_token").is_none());
}

#[tokio::test]
async fn test_exchange_rejects_mismatched_redirect_uri() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_app_with_db(db.clone());
    let user_id = unique("user");
    let grove_id = seed_grove(&db, &user_id).await;
    let session = common::create_test_jwt(&user_id, &state.config.jwt_signing_key);

    let response = post_json(
        app.clone(),
        "/link",
        &session,
        serde_json::json!({
            "groveIds": [grove_id],
            "redirectUri": GOOD_REDIRECT,
            "state": "abc123",
        }),
    )
    .await;
    let body = common::body_json(response).await;
    let code = query_param(body["redirectUrl"].as_str().unwrap(), "code").unwrap();

    let form = format!(
        "grant_type=authorization_code&code={}&redirect_uri={}",
        code,
        urlencoding::encode("https://elsewhere.example.com/cb")
    );
    let response = post_token_form(app, form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_unknown_refresh_token_rejected() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, _) = common::create_app_with_db(db);

    let form = format!(
        "grant_type=refresh_token&refresh_token={}",
        unique("bogus-refresh")
    );
    let response = post_token_form(app, form).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = common::body_json(response).await;
    assert_eq!(body["error"], "invalid_grant");
}

#[tokio::test]
async fn test_authorize_skips_consent_for_linked_user() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_app_with_db(db.clone());
    let user_id = unique("user");
    let grove_id = seed_grove(&db, &user_id).await;
    let session = common::create_test_jwt(&user_id, &state.config.jwt_signing_key);

    let response = post_json(
        app.clone(),
        "/link",
        &session,
        serde_json::json!({
            "groveIds": [grove_id],
            "redirectUri": GOOD_REDIRECT,
            "state": "first",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    // A second authorize round now short-circuits straight back to Google.
    let uri = format!(
        "/auth?client_id=test-google-client&redirect_uri={}&state=second&response_type=code",
        urlencoding::encode(GOOD_REDIRECT)
    );
    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri(&uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", session))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
    let location = response
        .headers()
        .get(header::LOCATION)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(location.starts_with(GOOD_REDIRECT));
    assert!(query_param(location, "code").is_some());
    assert_eq!(query_param(location, "state").as_deref(), Some("second"));
}

#[tokio::test]
async fn test_status_reflects_linking_lifecycle() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_app_with_db(db.clone());
    let user_id = unique("user");
    let grove_id = seed_grove(&db, &user_id).await;
    let session = common::create_test_jwt(&user_id, &state.config.jwt_signing_key);

    let get_status = |app: axum::Router, session: String| async move {
        let response = app
            .oneshot(
                Request::builder()
                    .method("GET")
                    .uri("/status")
                    .header(header::AUTHORIZATION, format!("Bearer {}", session))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        common::body_json(response).await
    };

    // Never linked: null, not an error.
    let body = get_status(app.clone(), session.clone()).await;
    assert!(body["link"].is_null());

    // Groves selected but tokens not yet exchanged: link exists, not linked.
    let response = post_json(
        app.clone(),
        "/link",
        &session,
        serde_json::json!({
            "groveIds": [grove_id, grove_id],
            "redirectUri": GOOD_REDIRECT,
            "state": "abc123",
        }),
    )
    .await;
    let link_body = common::body_json(response).await;
    let code = query_param(link_body["redirectUrl"].as_str().unwrap(), "code").unwrap();

    let body = get_status(app.clone(), session.clone()).await;
    assert_eq!(body["link"]["linked"], false);
    // The duplicated grove id was deduplicated.
    assert_eq!(body["link"]["grove_ids"].as_array().unwrap().len(), 1);

    // After the exchange the link is live.
    let form = format!(
        "grant_type=authorization_code&code={}&redirect_uri={}",
        code,
        urlencoding::encode(GOOD_REDIRECT)
    );
    let response = post_token_form(app.clone(), form).await;
    assert_eq!(response.status(), StatusCode::OK);

    let body = get_status(app.clone(), session.clone()).await;
    assert_eq!(body["link"]["linked"], true);

    // Request-Sync is a 501 while no HomeGraph key is configured.
    let response = post_json(app.clone(), "/request-sync", &session, serde_json::json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);

    // Unlink is idempotent and clears the record.
    for _ in 0..2 {
        let response = post_json(app.clone(), "/unlink", &session, serde_json::json!({})).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = common::body_json(response).await;
        assert_eq!(body["success"], true);
    }

    let body = get_status(app.clone(), session.clone()).await;
    assert!(body["link"].is_null());

    // With no link, Request-Sync is a 404.
    let response = post_json(app.clone(), "/request-sync", &session, serde_json::json!({})).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_link_rejects_foreign_grove() {
    require_emulator!();

    let db = common::test_db().await;
    let (app, state) = common::create_app_with_db(db.clone());
    let owner = unique("owner");
    let outsider = unique("outsider");
    let grove_id = seed_grove(&db, &owner).await;
    let session = common::create_test_jwt(&outsider, &state.config.jwt_signing_key);

    let response = post_json(
        app,
        "/link",
        &session,
        serde_json::json!({
            "groveIds": [grove_id],
            "redirectUri": GOOD_REDIRECT,
            "state": "abc123",
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
