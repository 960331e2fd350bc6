//! REST API handlers for the race coordinator
//!
//! This module defines the API routes and handlers. Handlers only translate
//! between HTTP and [`RaceCoordinator`] calls; every rule lives in the
//! coordinator.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ErrorCategory;
use crate::metrics;
use crate::models::{self, Lap, RacePhase};

use super::config::{CoordinatorConfig, SettingsUpdate};
use super::error::CoordinatorError;
use super::manager::{LapRecorded, RaceCoordinator, RaceStatus};
use super::race::{RaceResult, RaceSummary};
use super::registry::ParticipantInfo;
use super::server::AppState;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Json<Self> {
        Json(Self {
            success: true,
            data,
        })
    }
}

/// Error body returned with every non-2xx response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            code: code.into(),
            error: message.into(),
        }
    }
}

/// Handler error, rendered as an [`ErrorResponse`]
#[derive(Debug)]
pub enum ApiError {
    Coordinator(CoordinatorError),
    BadRequest(String),
}

impl From<CoordinatorError> for ApiError {
    fn from(err: CoordinatorError) -> Self {
        Self::Coordinator(err)
    }
}

/// Status code for an error category
pub fn status_for(category: ErrorCategory) -> StatusCode {
    match category {
        ErrorCategory::Validation => StatusCode::BAD_REQUEST,
        ErrorCategory::NotFound => StatusCode::NOT_FOUND,
        ErrorCategory::Phase | ErrorCategory::Capacity => StatusCode::CONFLICT,
        ErrorCategory::Config => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorCategory::Transport | ErrorCategory::Other => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            Self::Coordinator(err) => (
                status_for(err.category()),
                ErrorResponse::new(err.code(), err.to_string()),
            ),
            Self::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                ErrorResponse::new("bad_request", message),
            ),
        };

        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub phase: RacePhase,
}

#[derive(Debug, Serialize)]
pub struct MaxParticipantsResponse {
    pub max_participants: usize,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub id: u32,
}

/// Phase and countdown after a lifecycle operation
#[derive(Debug, Serialize)]
pub struct PhaseResponse {
    pub phase: RacePhase,
    pub millis_remaining: i64,
}

/// Optional body for starting a race
#[derive(Debug, Default, Deserialize)]
pub struct StartRequest {
    pub countdown_ms: Option<u64>,
    pub target_laps: Option<u32>,
}

/// Optional body for finishing a race
#[derive(Debug, Default, Deserialize)]
pub struct FinishRequest {
    pub countdown_ms: Option<u64>,
}

/// Lap submitted by a device
///
/// The lap time is given either as a time-span string or in milliseconds.
#[derive(Debug, Deserialize)]
pub struct LapRequest {
    pub identifier: String,
    pub lap_time: Option<String>,
    pub lap_time_ms: Option<f64>,
}

impl LapRequest {
    fn duration(&self) -> Result<Duration, CoordinatorError> {
        match (&self.lap_time, self.lap_time_ms) {
            (Some(text), None) => models::parse_lap_time(text),
            (None, Some(millis)) => models::lap_time_from_millis(millis),
            _ => Err(CoordinatorError::InvalidLapTime {
                input: String::new(),
                reason: "Provide exactly one of lap_time or lap_time_ms".to_string(),
            }),
        }
    }
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health and metrics
        .route("/api/health", get(health_check))
        .route("/api/v1/metrics", get(prometheus_metrics))
        // Settings
        .route("/api/v1/race/max-participants", get(get_max_participants))
        .route("/api/v1/race/max-participants/{max}", put(set_max_participants))
        .route("/api/v1/race/settings", get(get_settings).put(update_settings))
        // Lifecycle
        .route("/api/v1/race/register/{identifier}", post(register))
        .route("/api/v1/race/start", post(start_race))
        .route("/api/v1/race/finish", post(finish_race))
        .route("/api/v1/race/countdown/cancel", post(cancel_countdown))
        .route("/api/v1/race/registration/open", post(open_registration))
        .route("/api/v1/race/state", get(race_state))
        // Laps and results
        .route("/api/v1/race/laps", post(add_lap))
        .route("/api/v1/race/participants", get(participants))
        .route("/api/v1/race/results", get(all_results))
        .route("/api/v1/race/results/current", get(current_results))
        .route("/api/v1/race/results/last/{id}", get(last_result))
        .with_state(state)
}

/// Parse an optional JSON body; an empty body yields the default
fn optional_body<T: DeserializeOwned + Default>(body: &Bytes) -> Result<T, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {e}")))
}

async fn phase_response(coordinator: &RaceCoordinator) -> PhaseResponse {
    let status = coordinator.status().await;
    PhaseResponse {
        phase: status.phase,
        millis_remaining: status.millis_remaining,
    }
}

// ============================================================================
// Health Handlers
// ============================================================================

/// Health check endpoint
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
        phase: state.coordinator.phase().await,
    })
}

/// Prometheus text exposition
async fn prometheus_metrics() -> Response {
    match metrics::encode_metrics() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorResponse::new("metrics_unavailable", e.to_string())),
        )
            .into_response(),
    }
}

// ============================================================================
// Settings Handlers
// ============================================================================

async fn get_max_participants(State(state): State<AppState>) -> ApiResult<MaxParticipantsResponse> {
    Ok(ApiResponse::success(MaxParticipantsResponse {
        max_participants: state.coordinator.max_participants().await,
    }))
}

async fn set_max_participants(
    State(state): State<AppState>,
    Path(max): Path<String>,
) -> ApiResult<MaxParticipantsResponse> {
    let max: usize = max.parse().map_err(|_| {
        ApiError::Coordinator(CoordinatorError::InvalidSetting {
            field: "max_participants",
            reason: format!("Not a participant count: {max}"),
        })
    })?;

    let max_participants = state.coordinator.set_max_participants(max).await?;
    Ok(ApiResponse::success(MaxParticipantsResponse { max_participants }))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<CoordinatorConfig> {
    Ok(ApiResponse::success(state.coordinator.settings().await))
}

async fn update_settings(
    State(state): State<AppState>,
    Json(update): Json<SettingsUpdate>,
) -> ApiResult<CoordinatorConfig> {
    Ok(ApiResponse::success(
        state.coordinator.update_settings(update).await?,
    ))
}

// ============================================================================
// Lifecycle Handlers
// ============================================================================

async fn register(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> ApiResult<RegisterResponse> {
    let id = state.coordinator.register(&identifier).await?;
    Ok(ApiResponse::success(RegisterResponse { id }))
}

/// Start a race and notify devices off the request path
async fn start_race(State(state): State<AppState>, body: Bytes) -> ApiResult<PhaseResponse> {
    let request: StartRequest = optional_body(&body)?;

    state
        .coordinator
        .start_race(request.countdown_ms, request.target_laps)
        .await?;
    let response = phase_response(&state.coordinator).await;

    if let Some(notifier) = state.notifier.clone() {
        let coordinator = state.coordinator.clone();
        let countdown_ms = u64::try_from(response.millis_remaining).unwrap_or(0);
        tokio::spawn(async move {
            let participants = coordinator.participant_addresses().await;
            notifier.notify_start(&participants, countdown_ms).await;
        });
    }

    Ok(ApiResponse::success(response))
}

async fn finish_race(State(state): State<AppState>, body: Bytes) -> ApiResult<PhaseResponse> {
    let request: FinishRequest = optional_body(&body)?;

    state.coordinator.finish_race(request.countdown_ms).await?;
    Ok(ApiResponse::success(phase_response(&state.coordinator).await))
}

async fn cancel_countdown(State(state): State<AppState>) -> ApiResult<PhaseResponse> {
    state.coordinator.cancel_countdown().await?;
    Ok(ApiResponse::success(phase_response(&state.coordinator).await))
}

async fn open_registration(State(state): State<AppState>) -> ApiResult<PhaseResponse> {
    state.coordinator.open_registration().await?;
    Ok(ApiResponse::success(phase_response(&state.coordinator).await))
}

async fn race_state(State(state): State<AppState>) -> ApiResult<RaceStatus> {
    Ok(ApiResponse::success(state.coordinator.status().await))
}

// ============================================================================
// Lap and Result Handlers
// ============================================================================

async fn add_lap(
    State(state): State<AppState>,
    Json(request): Json<LapRequest>,
) -> ApiResult<LapRecorded> {
    let duration = request.duration()?;
    let recorded = state
        .coordinator
        .add_lap_result(&request.identifier, duration)
        .await?;
    Ok(ApiResponse::success(recorded))
}

async fn participants(State(state): State<AppState>) -> ApiResult<Vec<ParticipantInfo>> {
    Ok(ApiResponse::success(state.coordinator.participants().await))
}

async fn all_results(State(state): State<AppState>) -> ApiResult<Vec<RaceSummary>> {
    Ok(ApiResponse::success(state.coordinator.all_races().await))
}

async fn current_results(State(state): State<AppState>) -> ApiResult<BTreeMap<u32, Vec<Lap>>> {
    Ok(ApiResponse::success(
        state.coordinator.current_race_results().await,
    ))
}

async fn last_result(
    State(state): State<AppState>,
    Path(id): Path<u32>,
) -> ApiResult<RaceResult> {
    Ok(ApiResponse::success(
        state.coordinator.last_race_result(id).await?,
    ))
}

// ============================================================================
// Tests
// ============================================================================
