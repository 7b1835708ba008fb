// Clock-driven output unit
//
// Renders frames against the tokio clock instead of a sound device. Each
// queued frame starts exactly where the previous one ends, so the timeline
// is gapless by construction. Used when running headless and in tests.

use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info};

use super::decoder::DecodedFrame;
use super::output::{AudioOutput, FrameEnd, OutputFactory};
use crate::error::{PipelineError, PipelineResult};

pub struct ClockedOutput {
    sample_rate: u32,
    /// When the last queued frame finishes rendering
    timeline_end: Option<Instant>,
    timers: Vec<JoinHandle<()>>,
    closed: bool,
}

impl ClockedOutput {
    pub fn new(sample_rate: u32) -> Self {
        info!("Clocked output opened at {} Hz", sample_rate);
        Self {
            sample_rate,
            timeline_end: None,
            timers: Vec::new(),
            closed: false,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }
}

impl AudioOutput for ClockedOutput {
    fn play(&mut self, frame: DecodedFrame) -> PipelineResult<FrameEnd> {
        if self.closed {
            return Err(PipelineError::Output("output unit already closed".to_string()));
        }

        let now = Instant::now();
        let start = match self.timeline_end {
            Some(end) if end > now => end,
            _ => now,
        };
        let end = start + frame.duration();
        self.timeline_end = Some(end);

        debug!(
            "Frame {} scheduled: {} samples, peak {:.3}, ends in {:?}",
            frame.sequence,
            frame.samples.len(),
            frame.peak(),
            end - now
        );

        let (done_tx, done_rx) = oneshot::channel();
        self.timers.retain(|timer| !timer.is_finished());
        self.timers.push(tokio::spawn(async move {
            tokio::time::sleep_until(end).await;
            let _ = done_tx.send(());
        }));

        Ok(done_rx)
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        for timer in self.timers.drain(..) {
            timer.abort();
        }
        self.timeline_end = None;
        info!("Clocked output closed");
    }

    fn is_closed(&self) -> bool {
        self.closed
    }

    fn name(&self) -> &str {
        "clocked"
    }
}

impl Drop for ClockedOutput {
    fn drop(&mut self) {
        self.close();
    }
}

pub struct ClockedOutputFactory;

impl OutputFactory for ClockedOutputFactory {
    fn open(&self, sample_rate: u32) -> PipelineResult<Box<dyn AudioOutput>> {
        if sample_rate == 0 {
            return Err(PipelineError::Output("sample rate must be non-zero".to_string()));
        }
        Ok(Box::new(ClockedOutput::new(sample_rate)))
    }
}
