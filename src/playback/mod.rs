//! Streamed-audio playback pipeline
//!
//! This module provides the `PlaybackSession` abstraction that manages:
//! - A pull subscription on one device's audio subject
//! - Frame assembly and 16-bit PCM decoding
//! - Gapless scheduling of decoded frames onto one output unit
//! - Coordinated teardown of all of the above on stop

mod config;
mod consumer;
mod scheduler;
mod session;
mod stats;

pub use config::{PlaybackConfig, MAX_SAMPLE_RATE, MIN_SAMPLE_RATE};
pub use consumer::PullConsumer;
pub use scheduler::{PlaybackScheduler, SchedulerState, MAX_QUEUED_FRAMES};
pub use session::PlaybackSession;
pub use stats::{SessionCounters, SessionStats};
