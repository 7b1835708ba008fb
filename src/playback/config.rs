use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::audio::OverflowPolicy;
use crate::error::{PipelineError, PipelineResult};

/// Frame layout and pull cadence for a playback session
///
/// The defaults mirror the deployed pipeline: 10-message pull batches every
/// 200 ms, 8192 samples per message, 10 messages per frame, 32 kHz output.
/// One frame therefore holds 81920 samples (2.56 s of audio).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Maximum messages requested per pull
    pub batch_size: usize,

    /// Samples carried by one message from the upstream pipeline
    pub samples_per_message: usize,

    /// Messages that make up one frame
    pub messages_per_frame: usize,

    /// Delay between pull requests
    pub poll_interval_ms: u64,

    /// Output sample rate used when the device rate is unknown or ignored
    pub output_sample_rate: u32,

    /// Handling of payloads that run past a frame boundary
    pub overflow_policy: OverflowPolicy,

    /// Play at the device's reported resample rate when available
    pub follow_device_rate: bool,

    /// Consecutive empty pulls before a stall warning is logged
    pub stall_warn_polls: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            samples_per_message: 8192,
            messages_per_frame: 10,
            poll_interval_ms: 200,
            output_sample_rate: 32000,
            overflow_policy: OverflowPolicy::Split,
            follow_device_rate: true,
            stall_warn_polls: 25, // ~5s of silence at 200ms polls
        }
    }
}

pub const MIN_SAMPLE_RATE: u32 = 8_000;
pub const MAX_SAMPLE_RATE: u32 = 384_000;

impl PlaybackConfig {
    /// Bytes carried by one message
    pub fn message_bytes(&self) -> usize {
        self.samples_per_message.saturating_mul(2)
    }

    /// Frame buffer capacity in bytes
    pub fn frame_capacity(&self) -> usize {
        self.message_bytes().saturating_mul(self.messages_per_frame)
    }

    /// Samples in one decoded frame
    pub fn frame_samples(&self) -> usize {
        self.frame_capacity() / 2
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Playback duration of one frame at `sample_rate`
    pub fn frame_duration(&self, sample_rate: u32) -> Duration {
        if sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.frame_samples() as f64 / sample_rate as f64)
    }

    /// Copy of this config playing at `sample_rate` instead
    pub fn with_output_rate(&self, sample_rate: u32) -> Self {
        Self {
            output_sample_rate: sample_rate,
            ..self.clone()
        }
    }

    /// Check that the layout constants are non-zero and in range
    pub fn validate(&self) -> PipelineResult<()> {
        let invalid = |msg: String| Err(PipelineError::InvalidConfig(msg));

        if self.batch_size == 0 {
            return invalid("batch_size must be at least 1".to_string());
        }
        if self.samples_per_message == 0 {
            return invalid("samples_per_message must be at least 1".to_string());
        }
        if self.messages_per_frame == 0 {
            return invalid("messages_per_frame must be at least 1".to_string());
        }
        if self.poll_interval_ms == 0 {
            return invalid("poll_interval_ms must be at least 1".to_string());
        }
        if !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.output_sample_rate) {
            return invalid(format!(
                "output_sample_rate {} outside {}..={} Hz",
                self.output_sample_rate, MIN_SAMPLE_RATE, MAX_SAMPLE_RATE
            ));
        }

        let capacity = self
            .samples_per_message
            .checked_mul(2)
            .and_then(|bytes| bytes.checked_mul(self.messages_per_frame));
        if capacity.is_none() {
            return invalid("frame capacity overflows".to_string());
        }

        Ok(())
    }
}
