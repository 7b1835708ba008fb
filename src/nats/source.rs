use anyhow::Result;

use crate::error::PipelineResult;

/// A pulled message awaiting acknowledgment
#[async_trait::async_trait]
pub trait PendingMessage: Send {
    /// Raw little-endian 16-bit PCM bytes
    fn payload(&self) -> &[u8];

    /// Acknowledge the message once its payload has been copied.
    ///
    /// Unacknowledged messages become eligible for broker redelivery.
    async fn ack(&mut self) -> Result<()>;
}

/// Pull subscription on a single stream subject
///
/// Implementations:
/// - JetStream: ephemeral pull consumer, explicit ack, new-only delivery
/// - In-memory sources in tests
#[async_trait::async_trait]
pub trait PullSource: Send {
    /// Request up to `max_messages` pending messages without waiting.
    ///
    /// Returns whatever is available right now, possibly nothing.
    async fn fetch(&mut self, max_messages: usize) -> Result<Vec<Box<dyn PendingMessage>>>;

    /// Tear the subscription down. Safe to call more than once.
    async fn close(&mut self) -> Result<()>;

    /// Whether the source will never yield another message.
    ///
    /// Live subscriptions never end on their own.
    fn is_exhausted(&self) -> bool {
        false
    }

    /// Subject this source pulls from
    fn subject(&self) -> &str;
}

/// Opens pull sources for playback sessions
#[async_trait::async_trait]
pub trait SourceFactory: Send + Sync {
    /// Connect and subscribe. Connection failures map to
    /// `PipelineError::Connection`, subscription failures to
    /// `PipelineError::Subscription`; nothing is left open on failure.
    async fn open(&self, subject: &str) -> PipelineResult<Box<dyn PullSource>>;
}
