// Playback scheduler
//
// Drives one output unit per session. A decoded frame is queued on the
// output as soon as it arrives, directly behind the frame that is still
// rendering, so frame k+1 is assembled while frame k plays and starts the
// instant it ends.
//
// States:
//   Idle     -> Priming   session start
//   Priming  -> Playing   first (or next) frame handed to the output
//   Playing  -> Priming   frame ended and nothing else is queued
//   Playing  -> Draining  consumer finished while frames still render
//   *        -> Stopped   stop request, fatal error, or drain complete

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::stats::SessionCounters;
use crate::audio::{AudioOutput, DecodedFrame, FrameEnd, OutputFactory};
use crate::error::{PipelineError, PipelineResult};

/// Frames held by the output at once: the one rendering plus the next
pub const MAX_QUEUED_FRAMES: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    /// No session activity yet
    Idle,
    /// Frame buffer filling, nothing rendering
    Priming,
    /// Output is rendering a decoded frame
    Playing,
    /// Source finished; rendering what is already queued
    Draining,
    /// Terminal for the session
    Stopped,
}

pub struct PlaybackScheduler {
    outputs: Arc<dyn OutputFactory>,
    sample_rate: u32,
    output: Option<Box<dyn AudioOutput>>,
    in_flight: VecDeque<FrameEnd>,
    state_tx: watch::Sender<SchedulerState>,
    counters: Arc<SessionCounters>,
}

impl PlaybackScheduler {
    pub fn new(
        outputs: Arc<dyn OutputFactory>,
        sample_rate: u32,
        state_tx: watch::Sender<SchedulerState>,
        counters: Arc<SessionCounters>,
    ) -> Self {
        Self {
            outputs,
            sample_rate,
            output: None,
            in_flight: VecDeque::new(),
            state_tx,
            counters,
        }
    }

    /// Play frames as they arrive until stopped.
    ///
    /// A shutdown signal hard-stops: the output is closed mid-frame and any
    /// queued frames are dropped. The output is closed on every exit path.
    pub async fn run(
        mut self,
        mut frames_rx: mpsc::Receiver<DecodedFrame>,
        mut shutdown: watch::Receiver<bool>,
    ) -> PipelineResult<()> {
        self.transition(SchedulerState::Priming);

        let result = self.schedule(&mut frames_rx, &mut shutdown).await;

        frames_rx.close();
        self.in_flight.clear();
        if let Some(mut output) = self.output.take() {
            output.close();
        }
        self.transition(SchedulerState::Stopped);

        result
    }

    async fn schedule(
        &mut self,
        frames_rx: &mut mpsc::Receiver<DecodedFrame>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PipelineResult<()> {
        let mut source_done = false;

        loop {
            if *shutdown.borrow() {
                info!("Playback stop requested");
                return Ok(());
            }

            let accepting = !source_done && self.in_flight.len() < MAX_QUEUED_FRAMES;
            let rendering = !self.in_flight.is_empty();

            tokio::select! {
                biased;
                _ = shutdown.changed() => {
                    info!("Playback stop requested");
                    return Ok(());
                }
                _ = next_frame_end(&mut self.in_flight), if rendering => {
                    self.in_flight.pop_front();
                    self.counters.frames_played.fetch_add(1, Ordering::SeqCst);

                    if self.in_flight.is_empty() {
                        if source_done {
                            info!("Playback drained");
                            return Ok(());
                        }
                        self.transition(SchedulerState::Priming);
                    }
                }
                frame = frames_rx.recv(), if accepting => match frame {
                    Some(frame) => self.play(frame)?,
                    None => {
                        source_done = true;
                        if self.in_flight.is_empty() {
                            return Ok(());
                        }
                        self.transition(SchedulerState::Draining);
                    }
                },
            }
        }
    }

    fn play(&mut self, frame: DecodedFrame) -> PipelineResult<()> {
        if self.output.is_none() {
            let output = self.outputs.open(self.sample_rate)?;
            info!("Output unit '{}' opened at {} Hz", output.name(), self.sample_rate);
            self.output = Some(output);
        }

        debug!(
            "Queueing frame {} ({:?}) behind {} in flight",
            frame.sequence,
            frame.duration(),
            self.in_flight.len()
        );
        let end = match self.output.as_mut() {
            Some(output) => output.play(frame)?,
            None => return Err(PipelineError::Output("output unit unavailable".to_string())),
        };
        self.in_flight.push_back(end);
        self.transition(SchedulerState::Playing);
        Ok(())
    }

    fn transition(&self, next: SchedulerState) {
        let previous = self.state_tx.send_replace(next);
        if previous != next {
            debug!("Scheduler {:?} -> {:?}", previous, next);
        }
    }
}

/// Resolve when the oldest queued frame finishes (or its output is gone)
async fn next_frame_end(in_flight: &mut VecDeque<FrameEnd>) {
    match in_flight.front_mut() {
        Some(end) => {
            if end.await.is_err() {
                warn!("Output dropped a frame before it finished");
            }
        }
        None => std::future::pending().await,
    }
}
