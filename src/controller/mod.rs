//! Playback controller
//!
//! This module provides the `PlaybackController` that manages:
//! - The user-facing playing flag and device selection
//! - Start/stop/toggle of the single active playback session
//! - Device switching and configuration updates via the REST API
//! - User-visible notifications for every outcome

mod controller;
mod notify;

pub use controller::{ControllerStatus, PlaybackController};
pub use notify::{Notification, NotificationLevel, Notifications, NOTIFICATION_CAPACITY};
