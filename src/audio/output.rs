use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

use super::decoder::DecodedFrame;
use crate::error::PipelineResult;

/// Signal fired when a frame's last sample has been rendered.
///
/// Resolves with an error if the output unit was closed first.
pub type FrameEnd = oneshot::Receiver<()>;

/// Audio output unit
///
/// Implementations:
/// - Clocked: renders against the tokio clock (headless, tests)
/// - Cpal: host default output device (feature `cpal-output`)
///
/// One unit lives for at most one playback session and is reused for every
/// frame of that session.
pub trait AudioOutput: Send {
    /// Queue a frame directly behind whatever is currently rendering.
    ///
    /// Returns the frame's end-of-frame signal.
    fn play(&mut self, frame: DecodedFrame) -> PipelineResult<FrameEnd>;

    /// Stop rendering immediately and release the device.
    ///
    /// Queued frames are discarded. Calling this twice is a no-op.
    fn close(&mut self);

    /// Whether `close` has been called
    fn is_closed(&self) -> bool;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Opens output units for new playback sessions
pub trait OutputFactory: Send + Sync {
    fn open(&self, sample_rate: u32) -> PipelineResult<Box<dyn AudioOutput>>;
}

/// Output backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputBackend {
    /// Clock-driven rendering without a sound device
    #[default]
    Clocked,
    /// Host default output device via cpal
    Cpal,
}

/// Output factory selection based on build features and configuration
pub struct OutputBackendFactory;

impl OutputBackendFactory {
    pub fn create(backend: OutputBackend) -> PipelineResult<Arc<dyn OutputFactory>> {
        match backend {
            OutputBackend::Clocked => Ok(Arc::new(super::clocked::ClockedOutputFactory)),

            OutputBackend::Cpal => {
                #[cfg(feature = "cpal-output")]
                {
                    Ok(Arc::new(super::cpal_output::CpalOutputFactory))
                }

                #[cfg(not(feature = "cpal-output"))]
                {
                    Err(crate::error::PipelineError::Output(
                        "cpal output requires building with the `cpal-output` feature".to_string(),
                    ))
                }
            }
        }
    }
}
