use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use super::scheduler::SchedulerState;

/// Statistics about a playback session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStats {
    /// Session identifier
    pub session_id: String,

    /// Device whose stream is playing
    pub device: String,

    /// Subject being pulled
    pub subject: String,

    /// Scheduler state at the time of the snapshot
    pub state: SchedulerState,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// Session age in seconds
    pub duration_secs: f64,

    /// Messages copied into the frame buffer and acknowledged
    pub messages_acked: u64,

    /// Payload bytes received
    pub bytes_received: u64,

    /// Frames assembled and decoded
    pub frames_decoded: u64,

    /// Frames rendered to the end
    pub frames_played: u64,

    /// Pull requests that returned nothing
    pub empty_polls: u64,

    /// When the most recent message arrived
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Live counters shared by a session's consumer and scheduler tasks
#[derive(Debug, Default)]
pub struct SessionCounters {
    pub messages_acked: AtomicU64,
    pub bytes_received: AtomicU64,
    pub frames_decoded: AtomicU64,
    pub frames_played: AtomicU64,
    pub empty_polls: AtomicU64,
    last_message_at: Mutex<Option<DateTime<Utc>>>,
}

impl SessionCounters {
    pub fn record_message(&self, bytes: usize) {
        self.messages_acked.fetch_add(1, Ordering::SeqCst);
        self.bytes_received.fetch_add(bytes as u64, Ordering::SeqCst);
        if let Ok(mut last) = self.last_message_at.lock() {
            *last = Some(Utc::now());
        }
    }

    pub fn last_message_at(&self) -> Option<DateTime<Utc>> {
        self.last_message_at.lock().ok().and_then(|last| *last)
    }
}
