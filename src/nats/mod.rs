pub mod client;
pub mod source;
pub mod subject;

pub use client::{JetStreamSource, NatsClient, NatsSourceFactory};
pub use source::{PendingMessage, PullSource, SourceFactory};
pub use subject::{stream_for_subject, stream_subject, subject_matches};
