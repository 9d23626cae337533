use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::json;

use ranker_api::seed;
use ranker_api::users::STATUS_SUSPENDED;

mod common;
use common::{build_app, create_user, get, login, post, ScriptedLlmProvider};

#[tokio::test]
async fn admin_login_sets_cookie_and_me_is_sanitized() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;
    assert!(seed::seed_admin(&app.users).await.unwrap());

    let (status, cookie, body) = login(&app.router, "admin@local", "Admin123!").await;
    assert_eq!(status, StatusCode::OK);
    let user = body.get("user").unwrap();
    assert_eq!(user.get("email").and_then(|v| v.as_str()), Some("admin@local"));
    assert_eq!(user.get("role").and_then(|v| v.as_str()), Some("admin"));
    assert!(user.get("passwordHash").is_none());

    let cookie = cookie.unwrap();
    assert!(cookie.starts_with("auth_token="));

    let (status, me) = get(&app.router, "/api/auth/me", Some(&cookie)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me.get("email").and_then(|v| v.as_str()), Some("admin@local"));
    assert_eq!(me.get("status").and_then(|v| v.as_str()), Some("active"));
    assert!(me.get("passwordHash").is_none());
}

#[tokio::test]
async fn login_with_wrong_password_is_401_without_cookie() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;
    seed::seed_admin(&app.users).await.unwrap();

    let (status, cookie, _) = login(&app.router, "admin@local", "nope").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());

    let (status, cookie, _) = login(&app.router, "ghost@local", "Admin123!").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(cookie.is_none());
}

#[tokio::test]
async fn me_requires_a_valid_session() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;

    let (status, _) = get(&app.router, "/api/auth/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = get(&app.router, "/api/auth/me", Some("auth_token=garbage")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn suspended_user_is_denied_on_authenticated_calls() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;
    let user_id = create_user(&app, "host@example.com", "Secret1!").await;

    let (status, cookie, _) = login(&app.router, "host@example.com", "Secret1!").await;
    assert_eq!(status, StatusCode::OK);
    let cookie = cookie.unwrap();

    app.users.set_status(user_id, STATUS_SUSPENDED).await.unwrap();

    let (status, _) = get(&app.router, "/api/auth/me", Some(&cookie)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get(&app.router, "/api/conversations", Some(&cookie)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn logout_clears_the_session_cookie() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;

    let response = tower::ServiceExt::oneshot(
        app.router.clone(),
        axum::http::Request::builder()
            .method("POST")
            .uri("/api/auth/logout")
            .body(axum::body::Body::empty())
            .unwrap(),
    )
    .await
    .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let set_cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .unwrap();
    assert!(set_cookie.starts_with("auth_token="));
    assert!(set_cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;
    create_user(&app, "host@example.com", "Secret1!").await;

    let hash = common::test_password_hash("Other1!");
    let err = app
        .users
        .create_user("host@example.com", &hash, "user", "active", "pt-BR")
        .await
        .unwrap_err();
    assert!(matches!(err, ranker_api::RankerError::Validation(_)));
}

#[tokio::test]
async fn login_rejects_malformed_body() {
    let app = build_app(Arc::new(ScriptedLlmProvider::new()), 50).await;
    let (status, _) = post(&app.router, "/api/auth/login", None, json!({"email": "x"})).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}
