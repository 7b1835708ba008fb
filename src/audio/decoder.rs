use std::time::Duration;

use crate::error::{PipelineError, PipelineResult};

/// Half of the 16-bit range; maps i16 samples into [-1, 1)
pub const PCM16_FULL_SCALE: f32 = 32768.0;

/// A frame of normalized mono samples ready for an output unit
#[derive(Debug, Clone)]
pub struct DecodedFrame {
    /// Normalized samples in [-1, 1)
    pub samples: Vec<f32>,
    /// Playback sample rate in Hz
    pub sample_rate: u32,
    /// Position of this frame within its session (0-indexed)
    pub sequence: u64,
}

impl DecodedFrame {
    /// Decode a complete byte frame of little-endian 16-bit PCM
    pub fn from_pcm16le(frame: &[u8], sample_rate: u32, sequence: u64) -> PipelineResult<Self> {
        Ok(Self {
            samples: decode_pcm16le(frame)?,
            sample_rate,
            sequence,
        })
    }

    /// How long this frame takes to render at its sample rate
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.samples.len() as f64 / self.sample_rate as f64)
    }

    /// Largest absolute sample value, for level diagnostics
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |peak, s| peak.max(s.abs()))
    }
}

/// Convert little-endian signed 16-bit PCM bytes into normalized samples.
///
/// Pure and deterministic: `samples.len() == frame.len() / 2`. An odd
/// byte count means a framing bug upstream and is rejected.
pub fn decode_pcm16le(frame: &[u8]) -> PipelineResult<Vec<f32>> {
    if frame.len() % 2 != 0 {
        return Err(PipelineError::Decode { len: frame.len() });
    }

    Ok(frame
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]) as f32 / PCM16_FULL_SCALE)
        .collect())
}
