use super::handlers;
use super::state::AppState;
use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Create the HTTP router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check))
        // Devices
        .route("/devices", get(handlers::list_devices))
        .route("/devices/:name/select", post(handlers::select_device))
        // Playback control
        .route("/status", get(handlers::get_status))
        .route("/playback/start", post(handlers::start_playback))
        .route("/playback/stop", post(handlers::stop_playback))
        .route("/playback/toggle", post(handlers::toggle_playback))
        // Device configuration
        .route("/config/modify", post(handlers::modify_config))
        .route("/config/reset", post(handlers::reset_config))
        .route("/notifications", get(handlers::get_notifications))
        // Add tracing middleware for request logging
        .layer(TraceLayer::new_for_http())
        // The dashboard is served from another origin
        .layer(CorsLayer::permissive())
        .with_state(state)
}
