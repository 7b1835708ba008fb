use crate::controller::PlaybackController;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Shared application state for HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// The one controller; handlers take turns so transitions never overlap
    pub controller: Arc<Mutex<PlaybackController>>,
}

impl AppState {
    pub fn new(controller: PlaybackController) -> Self {
        Self {
            controller: Arc::new(Mutex::new(controller)),
        }
    }
}
