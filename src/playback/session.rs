use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::config::PlaybackConfig;
use super::consumer::PullConsumer;
use super::scheduler::{PlaybackScheduler, SchedulerState};
use super::stats::{SessionCounters, SessionStats};
use crate::audio::OutputFactory;
use crate::error::{PipelineError, PipelineResult};
use crate::nats::SourceFactory;

/// Capacity of the decoded-frame hand-off between consumer and scheduler
const FRAME_CHANNEL_CAPACITY: usize = 1;

/// One active consumption + playback chain bound to a single device.
///
/// Owns the pull subscription (through the consumer task), the output unit
/// (through the scheduler task) and the stop signal both tasks watch.
/// Dropping a session without calling [`stop`](Self::stop) still signals
/// both tasks to shut down.
pub struct PlaybackSession {
    session_id: String,
    device: String,
    subject: String,
    started_at: chrono::DateTime<Utc>,
    shutdown_tx: Arc<watch::Sender<bool>>,
    state_rx: watch::Receiver<SchedulerState>,
    counters: Arc<SessionCounters>,
    consumer_task: Option<JoinHandle<PipelineResult<()>>>,
    scheduler_task: Option<JoinHandle<PipelineResult<()>>>,
    final_stats: Option<SessionStats>,
    /// First fatal audio-path error, if the session aborted
    error: Option<PipelineError>,
}

impl PlaybackSession {
    /// Validate the layout, subscribe to `subject` and start pulling.
    ///
    /// The output unit is opened lazily when the first frame completes.
    pub async fn start(
        device: &str,
        subject: &str,
        config: PlaybackConfig,
        sources: &dyn SourceFactory,
        outputs: Arc<dyn OutputFactory>,
    ) -> PipelineResult<Self> {
        config.validate()?;

        let session_id = format!("playback-{}", uuid::Uuid::new_v4());
        info!(
            "Starting playback session {} for {} on {}",
            session_id, device, subject
        );

        let source = sources.open(subject).await?;

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let shutdown_tx = Arc::new(shutdown_tx);
        let (state_tx, state_rx) = watch::channel(SchedulerState::Idle);
        let (frames_tx, frames_rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let counters = Arc::new(SessionCounters::default());

        let scheduler = PlaybackScheduler::new(
            outputs,
            config.output_sample_rate,
            state_tx,
            Arc::clone(&counters),
        );
        let consumer = PullConsumer::new(source, config, frames_tx, Arc::clone(&counters));

        // A fatal error in either task stops the other one too
        let scheduler_task = {
            let shutdown_tx = Arc::clone(&shutdown_tx);
            let shutdown_rx = shutdown_rx.clone();
            tokio::spawn(async move {
                let result = scheduler.run(frames_rx, shutdown_rx).await;
                if result.is_err() {
                    shutdown_tx.send_replace(true);
                }
                result
            })
        };

        let consumer_task = {
            let shutdown_tx = Arc::clone(&shutdown_tx);
            tokio::spawn(async move {
                let result = consumer.run(shutdown_rx).await;
                if result.is_err() {
                    shutdown_tx.send_replace(true);
                }
                result
            })
        };

        Ok(Self {
            session_id,
            device: device.to_string(),
            subject: subject.to_string(),
            started_at: Utc::now(),
            shutdown_tx,
            state_rx,
            counters,
            consumer_task: Some(consumer_task),
            scheduler_task: Some(scheduler_task),
            final_stats: None,
            error: None,
        })
    }

    /// Stop the session and wait until the subscription and the output
    /// unit are both released.
    ///
    /// Idempotent: later calls return the same final stats without side effects.
    pub async fn stop(&mut self) -> SessionStats {
        if let Some(stats) = &self.final_stats {
            return stats.clone();
        }

        info!("Stopping playback session {}", self.session_id);
        self.shutdown_tx.send_replace(true);

        let consumer = Self::join("consumer", self.consumer_task.take()).await;
        let scheduler = Self::join("scheduler", self.scheduler_task.take()).await;

        self.error = consumer.err().or(scheduler.err());
        if let Some(e) = &self.error {
            warn!("Playback session {} ended with error: {}", self.session_id, e);
        }

        let stats = self.stats();
        info!(
            "Playback session {} stopped ({} frames played, {} messages)",
            self.session_id, stats.frames_played, stats.messages_acked
        );
        self.final_stats = Some(stats.clone());
        stats
    }

    /// Error that ended the session, once stopped
    pub fn error(&self) -> Option<&PipelineError> {
        self.error.as_ref()
    }

    /// Take the error that ended the session, once stopped
    pub fn take_error(&mut self) -> Option<PipelineError> {
        self.error.take()
    }

    async fn join(
        task_name: &str,
        handle: Option<JoinHandle<PipelineResult<()>>>,
    ) -> PipelineResult<()> {
        let Some(handle) = handle else {
            return Ok(());
        };

        match handle.await {
            Ok(result) => result,
            Err(e) => {
                error!("Playback {} task panicked: {}", task_name, e);
                Ok(())
            }
        }
    }

    /// Whether playback ended without `stop` being called.
    ///
    /// True after a fatal error or once the source ended and playback drained.
    pub fn is_finished(&self) -> bool {
        self.scheduler_task
            .as_ref()
            .is_some_and(|task| task.is_finished())
    }

    pub fn is_stopped(&self) -> bool {
        self.final_stats.is_some()
    }

    pub fn state(&self) -> SchedulerState {
        *self.state_rx.borrow()
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Snapshot of the session's counters
    pub fn stats(&self) -> SessionStats {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let counters = &self.counters;

        SessionStats {
            session_id: self.session_id.clone(),
            device: self.device.clone(),
            subject: self.subject.clone(),
            state: self.state(),
            started_at: self.started_at,
            duration_secs: duration.num_milliseconds() as f64 / 1000.0,
            messages_acked: counters.messages_acked.load(Ordering::SeqCst),
            bytes_received: counters.bytes_received.load(Ordering::SeqCst),
            frames_decoded: counters.frames_decoded.load(Ordering::SeqCst),
            frames_played: counters.frames_played.load(Ordering::SeqCst),
            empty_polls: counters.empty_polls.load(Ordering::SeqCst),
            last_message_at: counters.last_message_at(),
        }
    }
}

impl Drop for PlaybackSession {
    fn drop(&mut self) {
        if self.final_stats.is_none() {
            warn!(
                "Playback session {} dropped without stop; signalling shutdown",
                self.session_id
            );
            self.shutdown_tx.send_replace(true);
        }
    }
}
