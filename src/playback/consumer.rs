// Pull consumer loop
//
// One loop per session both issues the bounded no-wait pulls and handles
// their results, so there is never more than one pull in flight and only
// this loop ever writes to the frame buffer. Completed frames are decoded
// and handed to the scheduler over a bounded channel; when the scheduler
// falls behind, the send blocks and pulling pauses.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::config::PlaybackConfig;
use super::stats::SessionCounters;
use crate::audio::{DecodedFrame, FrameAssembler};
use crate::error::{PipelineError, PipelineResult};
use crate::nats::PullSource;

pub struct PullConsumer {
    source: Box<dyn PullSource>,
    assembler: FrameAssembler,
    config: PlaybackConfig,
    frames_tx: mpsc::Sender<DecodedFrame>,
    counters: Arc<SessionCounters>,
    next_sequence: u64,
}

impl PullConsumer {
    pub fn new(
        source: Box<dyn PullSource>,
        config: PlaybackConfig,
        frames_tx: mpsc::Sender<DecodedFrame>,
        counters: Arc<SessionCounters>,
    ) -> Self {
        Self {
            source,
            assembler: FrameAssembler::new(config.frame_capacity()),
            config,
            frames_tx,
            counters,
            next_sequence: 0,
        }
    }

    /// Pull, assemble and decode until shutdown is signalled or a fatal
    /// error occurs. The subscription is closed on every exit path.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> PipelineResult<()> {
        let subject = self.source.subject().to_string();
        info!(
            "Pull consumer started on {} (batch={}, every {:?}, frame={} bytes)",
            subject,
            self.config.batch_size,
            self.config.poll_interval(),
            self.assembler.capacity()
        );

        let result = self.pull_loop(&mut shutdown).await;

        // Anything still buffered belongs to this session only
        self.assembler.discard();
        if let Err(e) = self.source.close().await {
            warn!("Failed to close subscription on {}: {}", subject, e);
        }

        match &result {
            Ok(()) => info!("Pull consumer on {} stopped", subject),
            Err(e) => warn!("Pull consumer on {} aborted: {}", subject, e),
        }

        result
    }

    async fn pull_loop(&mut self, shutdown: &mut watch::Receiver<bool>) -> PipelineResult<()> {
        let mut ticker = interval(self.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut empty_streak: u64 = 0;

        loop {
            if *shutdown.borrow() {
                return Ok(());
            }

            tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(()),
                _ = ticker.tick() => {}
            }

            let messages = tokio::select! {
                biased;
                _ = shutdown.changed() => return Ok(()),
                fetched = self.source.fetch(self.config.batch_size) => {
                    fetched.map_err(|e| PipelineError::Subscription {
                        subject: self.source.subject().to_string(),
                        reason: e.to_string(),
                    })?
                }
            };

            if messages.is_empty() {
                if self.source.is_exhausted() {
                    info!("Source {} ended", self.source.subject());
                    return Ok(());
                }
                empty_streak += 1;
                self.counters.empty_polls.fetch_add(1, Ordering::SeqCst);
                if empty_streak == self.config.stall_warn_polls {
                    warn!(
                        "No audio on {} for {:?}; still waiting",
                        self.source.subject(),
                        self.config.poll_interval() * empty_streak as u32
                    );
                }
                continue;
            }
            empty_streak = 0;

            for mut message in messages {
                let frames = self
                    .assembler
                    .push(message.payload(), self.config.overflow_policy)?;
                let bytes = message.payload().len();

                if let Err(e) = message.ack().await {
                    // Payload is already buffered; the broker may redeliver it
                    warn!("Ack failed on {}: {}", self.source.subject(), e);
                }
                self.counters.record_message(bytes);

                for frame in frames {
                    if !self.deliver(frame, shutdown).await? {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Decode one frame and hand it to the scheduler.
    ///
    /// Returns `false` if the session is shutting down.
    async fn deliver(
        &mut self,
        frame: Vec<u8>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> PipelineResult<bool> {
        let decoded =
            DecodedFrame::from_pcm16le(&frame, self.config.output_sample_rate, self.next_sequence)?;
        self.next_sequence += 1;
        self.counters.frames_decoded.fetch_add(1, Ordering::SeqCst);
        debug!(
            "Frame {} decoded ({} samples)",
            decoded.sequence,
            decoded.samples.len()
        );

        tokio::select! {
            biased;
            _ = shutdown.changed() => Ok(false),
            sent = self.frames_tx.send(decoded) => Ok(sent.is_ok()),
        }
    }
}
