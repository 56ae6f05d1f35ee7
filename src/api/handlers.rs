//! HTTP request handlers

use super::sse::agent_event_stream;
use super::types::{
    AddMessageRequest, ChatApiRequest, ChatApiResponse, CreateThreadRequest, DisableUserRequest,
    ErrorResponse, MessageResponse, ModelsResponse, RegisterRequest, SettingUpdateRequest,
    TokenRequest, TokenResponse, UpdateUserRequest,
};
use super::AppState;
use crate::auth;
use crate::db::{DbError, User};
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::headers::authorization::Bearer;
use axum_extra::headers::Authorization;
use axum_extra::TypedHeader;
use chrono::Utc;
use std::net::SocketAddr;

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Accounts
        .route("/api/auth/register", post(register))
        .route("/api/auth/token", post(login_for_access_token))
        .route("/api/users/me", get(read_current_user))
        .route("/api/users/update", post(update_user))
        .route("/api/users/disable", post(disable_user))
        // Model listing
        .route("/api/models", get(list_models))
        // Assistant
        .route("/api/chat/response", post(chat_response))
        .route("/api/chat/stream", post(chat_stream))
        // Threads
        .route("/api/threads", post(create_thread).get(list_threads))
        .route("/api/threads/:id", get(get_thread))
        .route("/api/threads/:id/disable", post(disable_thread))
        .route(
            "/api/threads/:id/messages",
            post(add_thread_message).get(list_thread_messages),
        )
        // Settings
        .route("/api/settings", get(get_settings).post(update_setting))
        // Version
        .route("/version", get(get_version))
        .with_state(state)
}

/// Resolve the bearer token to an active user.
fn authenticate(state: &AppState, bearer: &Authorization<Bearer>) -> Result<User, AppError> {
    let email = auth::verify_access_token(bearer.token(), &state.secret_key)
        .map_err(|_| AppError::Unauthorized)?;
    let user = state.db.get_user(&email).map_err(|_| AppError::Unauthorized)?;
    if user.disabled {
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

fn client_ip(addr: Option<&ConnectInfo<SocketAddr>>) -> Option<String> {
    addr.map(|info| info.0.ip().to_string())
}

// ============================================================
// Accounts
// ============================================================

async fn register(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    if payload.email.is_empty() || payload.password.is_empty() || payload.username.is_empty() {
        return Err(AppError::BadRequest(
            "username, email and password are required".to_string(),
        ));
    }

    let password_hash = auth::hash_password(&payload.password);
    state.db.create_user(
        &payload.email,
        &payload.username,
        &password_hash,
        client_ip(addr.as_ref()).as_deref(),
    )?;

    tracing::info!(email = %payload.email, "user registered");
    Ok(Json(MessageResponse::new("User created")))
}

async fn login_for_access_token(
    State(state): State<AppState>,
    addr: Option<ConnectInfo<SocketAddr>>,
    Json(payload): Json<TokenRequest>,
) -> Result<Json<TokenResponse>, AppError> {
    if payload.email.is_empty() || payload.password.is_empty() {
        return Err(AppError::BadRequest(
            "missing email or password".to_string(),
        ));
    }

    let user = state
        .db
        .get_user(&payload.email)
        .map_err(|_| AppError::Unauthorized)?;
    if user.disabled || !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::Unauthorized);
    }

    let access_token =
        auth::create_access_token(&user.email, &state.secret_key, state.token_ttl_minutes)
            .map_err(|e| AppError::Internal(e.to_string()))?;

    if let Some(ip) = client_ip(addr.as_ref()) {
        if let Err(e) = state.db.record_login(&user.email, &ip, Utc::now()) {
            tracing::warn!(email = %user.email, error = %e, "failed to record login");
        }
    }

    Ok(Json(TokenResponse {
        access_token,
        token_type: "bearer".to_string(),
    }))
}

async fn read_current_user(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<User>, AppError> {
    let user = authenticate(&state, &bearer)?;
    Ok(Json(user))
}

async fn update_user(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = authenticate(&state, &bearer)?;

    if let Some(username) = payload.username.filter(|u| !u.is_empty()) {
        state.db.update_username(&user.email, &username)?;
    }
    if let Some(password) = payload.password.filter(|p| !p.is_empty()) {
        state
            .db
            .update_password(&user.email, &auth::hash_password(&password))?;
    }

    Ok(Json(MessageResponse::new("User updated")))
}

async fn disable_user(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<DisableUserRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = authenticate(&state, &bearer)?;

    if !auth::verify_password(&payload.password, &user.password_hash) {
        return Err(AppError::BadRequest("Wrong password".to_string()));
    }
    state.db.set_user_disabled(&user.email, true)?;

    tracing::info!(email = %user.email, "user disabled");
    Ok(Json(MessageResponse::new("User disabled")))
}

// ============================================================
// Models
// ============================================================

async fn list_models(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<ModelsResponse>, AppError> {
    authenticate(&state, &bearer)?;
    let data = state
        .llm
        .list_models()
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(Json(ModelsResponse { data }))
}

// ============================================================
// Assistant
// ============================================================

/// Memory key for a chat request: the caller's thread if given, else a
/// per-user session. Never a shared constant.
fn session_key(user: &User, thread_id: Option<String>) -> String {
    thread_id.unwrap_or_else(|| format!("user:{}", user.email))
}

async fn chat_response(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<ChatApiRequest>,
) -> Result<Json<ChatApiResponse>, AppError> {
    let user = authenticate(&state, &bearer)?;
    let session = session_key(&user, payload.thread_id);

    let response = state
        .agent
        .get_response(payload.messages, payload.model, payload.advanced, session)
        .await;
    Ok(Json(ChatApiResponse { response }))
}

async fn chat_stream(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<ChatApiRequest>,
) -> Result<Response, AppError> {
    let user = authenticate(&state, &bearer)?;
    let session = session_key(&user, payload.thread_id);

    let events =
        state
            .agent
            .stream_response(payload.messages, payload.model, payload.advanced, session);
    Ok(agent_event_stream(events).into_response())
}

// ============================================================
// Threads
// ============================================================

async fn create_thread(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<CreateThreadRequest>,
) -> Result<Json<crate::db::Thread>, AppError> {
    let user = authenticate(&state, &bearer)?;

    let thread_id = uuid::Uuid::new_v4().to_string();
    let title = payload
        .title
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| Utc::now().to_rfc3339());
    let thread = state.db.create_thread(&thread_id, &title, &user.email)?;
    Ok(Json(thread))
}

async fn list_threads(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<crate::db::Thread>>, AppError> {
    let user = authenticate(&state, &bearer)?;
    Ok(Json(state.db.get_threads(&user.email)?))
}

async fn get_thread(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
) -> Result<Json<crate::db::Thread>, AppError> {
    let user = authenticate(&state, &bearer)?;
    Ok(Json(state.db.get_thread(&thread_id, &user.email)?))
}

async fn disable_thread(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = authenticate(&state, &bearer)?;

    // Ownership check before mutation.
    state.db.get_thread(&thread_id, &user.email)?;
    state.db.set_thread_disabled(&thread_id, true)?;
    Ok(Json(MessageResponse::new("Thread disabled")))
}

async fn add_thread_message(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
    Json(payload): Json<AddMessageRequest>,
) -> Result<Json<crate::db::ThreadMessage>, AppError> {
    let user = authenticate(&state, &bearer)?;

    state.db.get_thread(&thread_id, &user.email)?;
    let message = state
        .db
        .add_thread_message(&thread_id, &user.username, &payload.message)?;
    Ok(Json(message))
}

async fn list_thread_messages(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Path(thread_id): Path<String>,
) -> Result<Json<Vec<crate::db::ThreadMessage>>, AppError> {
    let user = authenticate(&state, &bearer)?;

    state.db.get_thread(&thread_id, &user.email)?;
    Ok(Json(state.db.get_thread_messages(&thread_id)?))
}

// ============================================================
// Settings
// ============================================================

async fn get_settings(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Vec<crate::db::Setting>>, AppError> {
    let user = authenticate(&state, &bearer)?;
    Ok(Json(state.db.get_settings(&user.email)?))
}

async fn update_setting(
    State(state): State<AppState>,
    TypedHeader(bearer): TypedHeader<Authorization<Bearer>>,
    Json(payload): Json<SettingUpdateRequest>,
) -> Result<Json<MessageResponse>, AppError> {
    let user = authenticate(&state, &bearer)?;
    state
        .db
        .upsert_setting(&user.email, &payload.key, &payload.value)?;
    Ok(Json(MessageResponse::new("Settings updated")))
}

// ============================================================
// Version
// ============================================================

async fn get_version() -> &'static str {
    concat!("kelpie ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

pub(crate) enum AppError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(String),
}

impl From<DbError> for AppError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::UserNotFound(_) | DbError::ThreadNotFound(_) => AppError::NotFound(e.to_string()),
            DbError::UserExists(_) => AppError::BadRequest(e.to_string()),
            DbError::Sqlite(_) => AppError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "Could not validate credentials".to_string(),
            ),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let mut response = (status, Json(ErrorResponse::new(message))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
