//! HTTP API server for the playback controls
//!
//! This module provides a REST API mirroring the dashboard's controls:
//! - GET /health - Health check
//! - GET /devices - List registered devices
//! - POST /devices/:name/select - Switch device (playback stays stopped)
//! - GET /status - Playing flag, settings and session statistics
//! - POST /playback/start, /playback/stop, /playback/toggle
//! - POST /config/modify, /config/reset - Device configuration
//! - GET /notifications - Drain pending notifications

mod handlers;
mod routes;
mod state;

pub use routes::create_router;
pub use state::AppState;
