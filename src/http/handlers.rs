use super::state::AppState;
use crate::api::{DeviceSettings, DeviceSummary};
use crate::controller::{ControllerStatus, Notification};
use crate::error::PipelineError;
use crate::playback::SessionStats;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct StartPlaybackRequest {
    /// Device to play; the selected device if omitted
    pub device: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PlaybackResponse {
    pub is_playing: bool,
    pub device: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct DeviceListBody {
    pub devices: Vec<DeviceSummary>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

fn status_for(e: &PipelineError) -> StatusCode {
    match e {
        PipelineError::DeviceNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::InvalidSettings(_)
        | PipelineError::InvalidConfig(_)
        | PipelineError::InvalidSubject(_)
        | PipelineError::NoDeviceSelected => StatusCode::BAD_REQUEST,
        PipelineError::Connection { .. }
        | PipelineError::Subscription { .. }
        | PipelineError::ConfigApi(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn error_response(e: PipelineError) -> Response {
    let status = status_for(&e);
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }
    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

/// GET /devices
pub async fn list_devices(State(state): State<AppState>) -> Response {
    let mut controller = state.controller.lock().await;

    match controller.list_devices().await {
        Ok(devices) => (StatusCode::OK, Json(DeviceListBody { devices })).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /devices/:name/select
/// Select a device; playback is left stopped
pub async fn select_device(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    info!("Selecting device: {}", name);
    let mut controller = state.controller.lock().await;

    match controller.switch_device(&name).await {
        Ok(()) => (StatusCode::OK, Json(controller.status())).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /status
pub async fn get_status(State(state): State<AppState>) -> Json<ControllerStatus> {
    let mut controller = state.controller.lock().await;
    controller.reap().await;
    Json(controller.status())
}

/// POST /playback/start
pub async fn start_playback(
    State(state): State<AppState>,
    body: Option<Json<StartPlaybackRequest>>,
) -> Response {
    let request = body.map(|Json(req)| req).unwrap_or_default();
    let mut controller = state.controller.lock().await;

    let device = match request.device {
        Some(device) => device,
        None => match controller.selected_device() {
            Some(selected) => selected.to_string(),
            None => return error_response(PipelineError::NoDeviceSelected),
        },
    };

    match controller.start(&device).await {
        Ok(()) => (
            StatusCode::OK,
            Json(PlaybackResponse {
                is_playing: controller.is_playing(),
                device: Some(device),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /playback/stop
/// Returns the final session stats, or null if nothing was playing
pub async fn stop_playback(State(state): State<AppState>) -> Json<Option<SessionStats>> {
    let mut controller = state.controller.lock().await;
    Json(controller.stop().await)
}

/// POST /playback/toggle
pub async fn toggle_playback(State(state): State<AppState>) -> Response {
    let mut controller = state.controller.lock().await;

    match controller.toggle().await {
        Ok(is_playing) => (
            StatusCode::OK,
            Json(PlaybackResponse {
                is_playing,
                device: controller.selected_device().map(str::to_string),
            }),
        )
            .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /config/modify
pub async fn modify_config(
    State(state): State<AppState>,
    Json(settings): Json<DeviceSettings>,
) -> Response {
    let mut controller = state.controller.lock().await;

    match controller.modify(settings).await {
        Ok(()) => (StatusCode::OK, Json(controller.status())).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /config/reset
pub async fn reset_config(State(state): State<AppState>) -> Response {
    let mut controller = state.controller.lock().await;

    match controller.reset().await {
        Ok(()) => (StatusCode::OK, Json(controller.settings())).into_response(),
        Err(e) => error_response(e),
    }
}

/// GET /notifications
/// Drain pending notifications
pub async fn get_notifications(State(state): State<AppState>) -> Json<Vec<Notification>> {
    let mut controller = state.controller.lock().await;
    Json(controller.take_notifications())
}
