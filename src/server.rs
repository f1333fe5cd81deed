//!
//! yoga_app HTTP server
//! --------------------
//! This module defines the Axum-based HTTP API for the yoga studio.
//!
//! Responsibilities:
//! - Bearer-token authentication on every request (`identity::authenticate_request`).
//! - Login endpoint issuing HS512 tokens.
//! - Participation endpoints delegating to `ParticipationManager`.
//! - Read endpoints for sessions and users, and member self-deletion.
//! - First-run seeding of the default admin and a demo session.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{middleware, Extension, Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::ServerConfig;
use crate::error::{AppError, AppResult};
use crate::identity::{
    authenticate_request, AuthProvider, AuthenticatedContext, IdentityLookup, LocalAuthProvider, LoginRequest,
    RequestAuthenticator, TokenCodec,
};
use crate::participation::ParticipationManager;
use crate::storage::{EntityStore, MemoryStore, SharedEntityStore, User, YogaSession};

/// Shared server state injected into all handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: SharedEntityStore<User>,
    pub sessions: SharedEntityStore<YogaSession>,
    pub codec: Arc<TokenCodec>,
    pub authenticator: RequestAuthenticator,
    pub auth_provider: Arc<dyn AuthProvider>,
    pub participation: ParticipationManager,
}

impl AppState {
    pub fn new(users: SharedEntityStore<User>, sessions: SharedEntityStore<YogaSession>, codec: Arc<TokenCodec>) -> Self {
        let lookup = IdentityLookup::new(users.clone());
        Self {
            authenticator: RequestAuthenticator::new(codec.clone(), lookup.clone()),
            auth_provider: Arc::new(LocalAuthProvider::new(lookup, codec.clone())),
            participation: ParticipationManager::new(sessions.clone(), users.clone()),
            users,
            sessions,
            codec,
        }
    }

    /// State over fresh in-memory stores.
    pub fn in_memory(config: &ServerConfig) -> Self {
        let codec = Arc::new(TokenCodec::new(config.jwt_secret.clone(), config.jwt_ttl()));
        Self::new(Arc::new(MemoryStore::<User>::new()), Arc::new(MemoryStore::<YogaSession>::new()), codec)
    }
}

/// All routes, wrapped in the request authenticator.
pub fn router(state: AppState) -> Router {
    let auth = state.authenticator.clone();
    Router::new()
        .route("/", get(|| async { "yoga ok" }))
        .route("/api/auth/login", post(login))
        .route("/api/session/{id}", get(get_session))
        .route("/api/session/{id}/participate/{user_id}", post(participate).delete(no_longer_participate))
        .route("/api/user/{id}", get(get_user).delete(delete_user))
        .layer(middleware::from_fn_with_state(auth, authenticate_request))
        .with_state(state)
}

/// Seed the default admin and, on an empty session store, one demo session.
pub fn seed_defaults(state: &AppState, config: &ServerConfig) -> anyhow::Result<()> {
    crate::security::ensure_default_admin(state.users.as_ref(), &config.admin_email, &config.admin_password)?;
    if state.sessions.find_all()?.is_empty() {
        let demo = state.sessions.save(YogaSession::new(
            "Morning Flow",
            "Gentle vinyasa to start the day",
            Utc::now() + chrono::Duration::days(1),
            None,
        ))?;
        info!(target: "startup", "created demo session id={:?}", demo.id);
    }
    Ok(())
}

pub async fn run_with_config(config: ServerConfig) -> anyhow::Result<()> {
    info!(target: "startup", "yoga_app starting with {:?}", config);
    let state = AppState::in_memory(&config);
    seed_defaults(&state, &config)?;

    let app = router(state);
    let addr: SocketAddr = format!("0.0.0.0:{}", config.http_port).parse()?;
    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

/// Convenience entry point reading configuration from the environment.
pub async fn run() -> anyhow::Result<()> {
    run_with_config(ServerConfig::from_env()?).await
}

#[derive(Debug, Deserialize)]
struct LoginPayload { email: String, password: String }

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct JwtResponse {
    token: String,
    #[serde(rename = "type")]
    token_type: &'static str,
    id: i64,
    username: String,
    first_name: String,
    last_name: String,
    admin: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionDto {
    id: Option<i64>,
    name: String,
    date: DateTime<Utc>,
    description: String,
    #[serde(rename = "teacher_id")]
    teacher_id: Option<i64>,
    users: Vec<i64>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<YogaSession> for SessionDto {
    fn from(s: YogaSession) -> Self {
        Self {
            id: s.id,
            name: s.name,
            date: s.date,
            description: s.description,
            teacher_id: s.teacher_id,
            users: s.users.into_iter().collect(),
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct UserDto {
    id: Option<i64>,
    email: String,
    first_name: String,
    last_name: String,
    admin: bool,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl From<User> for UserDto {
    fn from(u: User) -> Self {
        Self {
            id: u.id,
            email: u.email,
            first_name: u.first_name,
            last_name: u.last_name,
            admin: u.admin,
            created_at: u.created_at,
            updated_at: u.updated_at,
        }
    }
}

fn store_failure(e: impl std::fmt::Display) -> AppError {
    AppError::io("store_unavailable".to_string(), e.to_string())
}

async fn login(State(state): State<AppState>, Json(payload): Json<LoginPayload>) -> AppResult<Json<JwtResponse>> {
    let resp = state.auth_provider.login(&LoginRequest { email: payload.email, password: payload.password })?;
    let p = resp.principal;
    Ok(Json(JwtResponse {
        token: resp.token,
        token_type: "Bearer",
        id: p.id,
        username: p.login_key,
        first_name: p.first_name,
        last_name: p.last_name,
        admin: p.admin,
    }))
}

async fn get_session(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthenticatedContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<SessionDto>> {
    ctx.require()?;
    let session = state.sessions.find(id).map_err(store_failure)?
        .ok_or_else(|| AppError::not_found("session_not_found".to_string(), format!("session {} not found", id)))?;
    Ok(Json(session.into()))
}

async fn participate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthenticatedContext>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<impl IntoResponse> {
    ctx.require()?;
    state.participation.add(id, user_id)?;
    Ok(StatusCode::OK)
}

async fn no_longer_participate(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthenticatedContext>,
    Path((id, user_id)): Path<(i64, i64)>,
) -> AppResult<impl IntoResponse> {
    ctx.require()?;
    state.participation.remove(id, user_id)?;
    Ok(StatusCode::OK)
}

async fn get_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthenticatedContext>,
    Path(id): Path<i64>,
) -> AppResult<Json<UserDto>> {
    ctx.require()?;
    let user = state.users.find(id).map_err(store_failure)?
        .ok_or_else(|| AppError::not_found("user_not_found".to_string(), format!("user {} not found", id)))?;
    Ok(Json(user.into()))
}

/// Members may only delete their own account.
async fn delete_user(
    State(state): State<AppState>,
    Extension(ctx): Extension<AuthenticatedContext>,
    Path(id): Path<i64>,
) -> AppResult<impl IntoResponse> {
    let principal = ctx.require()?;
    let user = state.users.find(id).map_err(store_failure)?
        .ok_or_else(|| AppError::not_found("user_not_found".to_string(), format!("user {} not found", id)))?;
    if user.email != principal.login_key {
        return Err(AppError::auth("unauthorized", "cannot delete another user"));
    }
    state.users.delete(id).map_err(store_failure)?;
    info!(target: "yoga_app::server", user_id = id, "user deleted");
    Ok(StatusCode::OK)
}
