use std::future::Future;
use std::sync::Arc;

use axum::{
    extract::{Json, Path, State},
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{self, AuthGate, AuthUser, SESSION_COOKIE};
use crate::config::Config;
use crate::conversations::ConversationStore;
use crate::error::{RankerError, Result};
use crate::providers::openai::OpenAiProvider;
use crate::services::chat::ChatService;
use crate::usage::UsageStore;
use crate::users::UserStore;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthGate>,
    pub conversations: Arc<ConversationStore>,
    pub chat: Arc<ChatService>,
    pub secure_cookies: bool,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    message: String,
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    user: AuthUser,
}

#[derive(Deserialize)]
struct CreateConversationRequest {
    title: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatRequest {
    conversation_id: i32,
    message: String,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route(
            "/api/conversations",
            get(list_conversations).post(create_conversation),
        )
        .route("/api/conversations/:id/messages", get(list_messages))
        .route("/api/chat", post(chat))
        .with_state(state)
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Response {
    match state.auth.login(&payload.email, &payload.password).await {
        Ok((user, token)) => {
            let cookie =
                auth::session_cookie(token, state.auth.ttl_days(), state.secure_cookies);
            let jar = jar.add(cookie);
            (jar, Json(LoginResponse { user })).into_response()
        }
        Err(err) => error_response(err),
    }
}

async fn logout(jar: CookieJar) -> Response {
    let jar = jar.remove(auth::removal_cookie());
    (jar, StatusCode::OK).into_response()
}

async fn me(State(state): State<AppState>, jar: CookieJar) -> Response {
    match authenticate(&state, &jar).await {
        Ok(user) => (StatusCode::OK, Json(user)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_conversations(State(state): State<AppState>, jar: CookieJar) -> Response {
    let user = match authenticate(&state, &jar).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };

    match state.conversations.list_for_user(user.id).await {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn create_conversation(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CreateConversationRequest>,
) -> Response {
    let user = match authenticate(&state, &jar).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };

    match state
        .conversations
        .create(user.id, payload.title.as_deref())
        .await
    {
        Ok(conversation) => (StatusCode::OK, Json(conversation)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn list_messages(
    State(state): State<AppState>,
    jar: CookieJar,
    Path(conversation_id): Path<i32>,
) -> Response {
    let user = match authenticate(&state, &jar).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };

    match state
        .conversations
        .list_messages(conversation_id, user.id)
        .await
    {
        Ok(items) => (StatusCode::OK, Json(items)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn chat(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<ChatRequest>,
) -> Response {
    let user = match authenticate(&state, &jar).await {
        Ok(user) => user,
        Err(err) => return error_response(err),
    };

    match state
        .chat
        .append_exchange(&user, payload.conversation_id, &payload.message)
        .await
    {
        Ok(exchange) => (StatusCode::OK, Json(exchange.assistant_message)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn authenticate(state: &AppState, jar: &CookieJar) -> Result<AuthUser> {
    let token = jar.get(SESSION_COOKIE).map(|cookie| cookie.value());
    state.auth.authenticate(token).await
}

fn error_response(err: RankerError) -> Response {
    let status = match &err {
        RankerError::Validation(_) => StatusCode::BAD_REQUEST,
        RankerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
        RankerError::Forbidden(_) => StatusCode::FORBIDDEN,
        RankerError::NotFound(_) => StatusCode::NOT_FOUND,
        RankerError::QuotaExceeded => StatusCode::TOO_MANY_REQUESTS,
        RankerError::Config(_)
        | RankerError::Upstream(_)
        | RankerError::Serialization(_)
        | RankerError::Runtime(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorResponse {
            message: err.to_string(),
        }),
    )
        .into_response()
}

pub async fn run(config: Config) -> Result<()> {
    run_with_shutdown(config, futures::future::pending::<()>()).await
}

pub async fn run_with_shutdown<F>(config: Config, shutdown: F) -> Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let sqlite_path = config.sqlite_path();
    let users = Arc::new(UserStore::new(&sqlite_path).await?);
    let conversations = Arc::new(ConversationStore::new(&sqlite_path).await?);
    let usage = Arc::new(UsageStore::new(&sqlite_path).await?);

    let generation = config.generation.clone().unwrap_or_default();
    let provider = Arc::new(OpenAiProvider::new(
        generation.api_key.unwrap_or_default(),
        generation.model,
        generation.base_url,
    ));

    let auth = Arc::new(AuthGate::new(
        users,
        config.session_secret(),
        config.session_ttl_days(),
    ));
    let chat = Arc::new(ChatService::new(
        conversations.clone(),
        usage,
        provider,
        config.max_messages_per_day(),
    ));

    let state = AppState {
        auth,
        conversations,
        chat,
        secure_cookies: config.secure_cookies(),
    };

    let origin = config
        .cors_origin()
        .parse::<HeaderValue>()
        .map_err(|e| RankerError::Config(e.to_string()))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    let app = build_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let addr = format!("{}:{}", config.host(), config.port());
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| RankerError::Runtime(e.to_string()))?;
    tracing::info!(%addr, "ranker api listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(|e| RankerError::Runtime(e.to_string()))?;

    Ok(())
}
