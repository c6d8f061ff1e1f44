use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header::WWW_AUTHENTICATE},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::errors::{OutcomeError, StoreError};
use crate::launch::{LaunchEvent, LaunchRecorder};
use crate::outcome::{ConsumerSecrets, OutcomeClient, report_score};
use crate::resolver::SessionResolver;
use crate::store::{DbHandle, LtiSession};

use super::auth::{ApiToken, require_api_token};

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub recorder: LaunchRecorder,
    pub resolver: SessionResolver,
    pub secrets: ConsumerSecrets,
    pub outcome_client: Arc<dyn OutcomeClient>,
}

impl AppState {
    pub fn new(db: DbHandle, secrets: ConsumerSecrets, outcome_client: Arc<dyn OutcomeClient>) -> Self {
        Self {
            recorder: LaunchRecorder::new(db.clone()),
            resolver: SessionResolver::new(db.clone()),
            db,
            secrets,
            outcome_client,
        }
    }
}

pub type SharedState = Arc<AppState>;

// ── Request / response payload types ──────────────────────────────────

#[derive(Deserialize)]
pub struct ContextQuery {
    pub path: String,
    pub user_id: String,
}

#[derive(Deserialize)]
pub struct SessionsQuery {
    pub user_id: Option<String>,
}

#[derive(Deserialize)]
pub struct GradeRequest {
    pub notebook_path: String,
    pub user_id: String,
    pub score: f64,
}

/// A session as returned by the API, with its derived checkout root.
#[derive(Serialize)]
pub struct SessionView {
    #[serde(flatten)]
    pub session: LtiSession,
    pub checkout_root: Option<String>,
}

impl From<LtiSession> for SessionView {
    fn from(session: LtiSession) -> Self {
        let checkout_root = session.checkout_root().map(str::to_string);
        Self {
            session,
            checkout_root,
        }
    }
}

// ── Error handling ────────────────────────────────────────────────────

pub enum ApiError {
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    /// The LMS could not be reached or refused the request.
    BadGateway {
        message: String,
        status: Option<u16>,
        code_major: Option<String>,
        description: Option<String>,
        body: Option<String>,
    },
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                [(WWW_AUTHENTICATE, "Bearer")],
                Json(serde_json::json!({"error": msg})),
            )
                .into_response(),
            ApiError::NotFound(msg) => {
                (StatusCode::NOT_FOUND, Json(serde_json::json!({"error": msg}))).into_response()
            }
            ApiError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, Json(serde_json::json!({"error": msg}))).into_response()
            }
            ApiError::BadGateway {
                message,
                status,
                code_major,
                description,
                body,
            } => (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "error": message,
                    "status": status,
                    "code_major": code_major,
                    "description": description,
                    "body": body,
                })),
            )
                .into_response(),
            ApiError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({"error": msg})),
            )
                .into_response(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::MissingField { .. } => ApiError::BadRequest(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<OutcomeError> for ApiError {
    fn from(err: OutcomeError) -> Self {
        let message = err.to_string();
        match err {
            OutcomeError::UnknownConsumer(_)
            | OutcomeError::MissingParam(_)
            | OutcomeError::ScoreOutOfRange(_)
            | OutcomeError::InvalidServiceUrl { .. } => ApiError::BadRequest(message),
            OutcomeError::Rejected {
                status,
                code_major,
                description,
                body,
            } => ApiError::BadGateway {
                message,
                status: Some(status),
                code_major: Some(code_major),
                description: Some(description),
                body: Some(body),
            },
            OutcomeError::Transport(_) => ApiError::BadGateway {
                message,
                status: None,
                code_major: None,
                description: None,
                body: None,
            },
            OutcomeError::Signing(_) => ApiError::Internal(message),
        }
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// `/health` is open; every `/api/*` route requires `token` as a bearer token.
pub fn api_router(token: ApiToken) -> Router<SharedState> {
    let api = Router::new()
        .route("/api/launches", post(record_launch))
        .route("/api/context", get(get_context))
        .route("/api/sessions", get(list_sessions))
        .route("/api/grades", post(submit_grade))
        .route_layer(middleware::from_fn_with_state(token, require_api_token));

    Router::new().route("/health", get(health_check)).merge(api)
}

// ── Handlers ──────────────────────────────────────────────────────────

async fn health_check() -> &'static str {
    "ok"
}

async fn record_launch(
    State(state): State<SharedState>,
    Json(event): Json<LaunchEvent>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state.recorder.record(event).await?;
    Ok((StatusCode::CREATED, Json(SessionView::from(session))))
}

async fn get_context(
    State(state): State<SharedState>,
    Query(query): Query<ContextQuery>,
) -> Result<impl IntoResponse, ApiError> {
    match state.resolver.resolve(&query.path, &query.user_id).await? {
        Some(context) => Ok(Json(context)),
        None => Err(ApiError::NotFound(format!(
            "No LTI session for '{}' and user '{}'",
            query.path, query.user_id
        ))),
    }
}

async fn list_sessions(
    State(state): State<SharedState>,
    Query(query): Query<SessionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let sessions = state
        .db
        .call(move |db| db.list_sessions(query.user_id.as_deref()))
        .await?;
    let views: Vec<SessionView> = sessions.into_iter().map(SessionView::from).collect();
    Ok(Json(views))
}

async fn submit_grade(
    State(state): State<SharedState>,
    Json(req): Json<GradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let session = state
        .resolver
        .session_for_path(&req.notebook_path, &req.user_id)
        .await?
        .ok_or_else(|| {
            ApiError::NotFound(format!(
                "No LTI session for '{}' and user '{}'",
                req.notebook_path, req.user_id
            ))
        })?;

    let response = report_score(
        state.outcome_client.as_ref(),
        &state.secrets,
        &session,
        req.score,
    )
    .await?;
    Ok(Json(response))
}

// ── Tests ─────────────────────────────────────────────────────────────
