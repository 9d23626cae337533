#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tower::ServiceExt;

use ranker_api::auth::AuthGate;
use ranker_api::conversations::ConversationStore;
use ranker_api::daemon::{build_router, AppState};
use ranker_api::error::Result;
use ranker_api::interfaces::providers::LlmProvider;
use ranker_api::services::chat::ChatService;
use ranker_api::usage::UsageStore;
use ranker_api::users::UserStore;

pub const TEST_SECRET: &str = "test_secret";

/// Provider double: pops scripted replies in order, falls back to a fixed
/// reply when the script runs dry, and counts every call so tests can assert
/// that quota/ownership rejections never reach the generation service.
pub struct ScriptedLlmProvider {
    replies: Mutex<VecDeque<Result<String>>>,
    fallback: String,
    calls: AtomicUsize,
}

impl ScriptedLlmProvider {
    pub fn new() -> Self {
        Self::with_replies(Vec::new())
    }

    pub fn with_replies(replies: Vec<Result<String>>) -> Self {
        Self {
            replies: Mutex::new(VecDeque::from(replies)),
            fallback: "análise concluída".to_string(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedLlmProvider {
    async fn generate_text(&self, _prompt: &str, _system_prompt: &str) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut guard = self.replies.lock().await;
        guard.pop_front().unwrap_or(Ok(self.fallback.clone()))
    }
}

pub struct TestApp {
    pub router: Router,
    pub users: Arc<UserStore>,
    pub conversations: Arc<ConversationStore>,
    pub usage: Arc<UsageStore>,
    pub provider: Arc<ScriptedLlmProvider>,
    db: NamedTempFile,
}

pub async fn build_app(provider: Arc<ScriptedLlmProvider>, cap: i64) -> TestApp {
    let db = NamedTempFile::new().unwrap();
    let path = db.path().to_str().unwrap().to_string();

    let users = Arc::new(UserStore::new(&path).await.unwrap());
    let conversations = Arc::new(ConversationStore::new(&path).await.unwrap());
    let usage = Arc::new(UsageStore::new(&path).await.unwrap());

    let auth = Arc::new(AuthGate::new(users.clone(), TEST_SECRET, 7));
    let chat = Arc::new(ChatService::new(
        conversations.clone(),
        usage.clone(),
        provider.clone(),
        cap,
    ));
    let state = AppState {
        auth,
        conversations: conversations.clone(),
        chat,
        secure_cookies: false,
    };

    TestApp {
        router: build_router(state),
        users,
        conversations,
        usage,
        provider,
        db,
    }
}

/// Low bcrypt cost keeps the suite fast; verification reads the cost from the
/// hash itself, so the login path is unchanged.
pub fn test_password_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

pub async fn create_user(app: &TestApp, email: &str, password: &str) -> i32 {
    let hash = test_password_hash(password);
    app.users
        .create_user(email, &hash, "user", "active", "pt-BR")
        .await
        .unwrap()
        .id
}

pub async fn login(router: &Router, email: &str, password: &str) -> (StatusCode, Option<String>, Value) {
    let response = router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/auth/login")
                .header("content-type", "application/json")
                .body(Body::from(
                    json!({"email": email, "password": password}).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|value| value.to_string());
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, cookie, value)
}

pub async fn get(router: &Router, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method("GET").uri(uri);
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}

pub async fn post(
    router: &Router,
    uri: &str,
    cookie: Option<&str>,
    body: Value,
) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header("cookie", cookie);
    }
    let response = router
        .clone()
        .oneshot(builder.body(Body::from(body.to_string())).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, value)
}
