use anyhow::{anyhow, Result};
use async_nats::jetstream::{
    self,
    consumer::{pull, AckPolicy, DeliverPolicy, PullConsumer},
};
use async_nats::{Client, ConnectOptions};
use futures::stream::{StreamExt, TryStreamExt};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::source::{PendingMessage, PullSource, SourceFactory};
use super::subject::stream_for_subject;
use crate::error::{PipelineError, PipelineResult};

pub struct NatsClient {
    client: Client,
    url: String,
}

impl NatsClient {
    /// Connect to NATS server
    pub async fn connect(url: &str, token: Option<&str>, timeout: Duration) -> PipelineResult<Self> {
        info!("Connecting to NATS at {}", url);

        let options = match token {
            Some(token) => ConnectOptions::with_token(token.to_string()),
            None => ConnectOptions::new(),
        };

        let client = options
            .connection_timeout(timeout)
            .connect(url)
            .await
            .map_err(|e| PipelineError::Connection {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        info!("Connected to NATS successfully");

        Ok(Self {
            client,
            url: url.to_string(),
        })
    }

    /// Create a pull consumer on `subject`: explicit ack, new messages only
    pub async fn pull_source(self, subject: &str) -> PipelineResult<JetStreamSource> {
        let subscription_error = |reason: String| PipelineError::Subscription {
            subject: subject.to_string(),
            reason,
        };

        let context = jetstream::new(self.client.clone());

        let stream_name = find_stream(&context, subject)
            .await
            .map_err(|e| subscription_error(e.to_string()))?;

        let stream = context
            .get_stream(&stream_name)
            .await
            .map_err(|e| subscription_error(format!("failed to look up stream {}: {}", stream_name, e)))?;

        let consumer: PullConsumer = stream
            .create_consumer(pull::Config {
                filter_subject: subject.to_string(),
                ack_policy: AckPolicy::Explicit,
                deliver_policy: DeliverPolicy::New,
                ..Default::default()
            })
            .await
            .map_err(|e| subscription_error(format!("failed to create pull consumer: {}", e)))?;

        let consumer_name = consumer.cached_info().name.clone();
        info!(
            "Pull consumer {} created on {} (stream {})",
            consumer_name, subject, stream_name
        );

        Ok(JetStreamSource {
            client: Some(self.client),
            stream: Some(stream),
            consumer: Some(consumer),
            consumer_name,
            subject: subject.to_string(),
            url: self.url,
        })
    }
}

/// Walk the broker's streams for the one whose subjects cover `subject`
async fn find_stream(context: &jetstream::Context, subject: &str) -> Result<String> {
    let mut infos = Vec::new();
    let mut streams = context.streams();
    while let Some(info) = streams
        .try_next()
        .await
        .map_err(|e| anyhow!("failed to list streams: {}", e))?
    {
        infos.push((info.config.name, info.config.subjects));
    }

    let candidates = infos
        .iter()
        .map(|(name, subjects)| (name.as_str(), subjects.as_slice()));
    stream_for_subject(candidates, subject)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("no stream carries this subject ({} streams checked)", infos.len()))
}

/// JetStream-backed pull source. Owns its connection, so closing it
/// releases everything the session opened on the broker.
pub struct JetStreamSource {
    client: Option<Client>,
    stream: Option<jetstream::stream::Stream>,
    consumer: Option<PullConsumer>,
    consumer_name: String,
    subject: String,
    url: String,
}

struct JetStreamMessage {
    inner: jetstream::Message,
}

#[async_trait::async_trait]
impl PendingMessage for JetStreamMessage {
    fn payload(&self) -> &[u8] {
        self.inner.message.payload.as_ref()
    }

    async fn ack(&mut self) -> Result<()> {
        self.inner
            .ack()
            .await
            .map_err(|e| anyhow!("Failed to ack message: {}", e))
    }
}

#[async_trait::async_trait]
impl PullSource for JetStreamSource {
    async fn fetch(&mut self, max_messages: usize) -> Result<Vec<Box<dyn PendingMessage>>> {
        let consumer = self
            .consumer
            .as_ref()
            .ok_or_else(|| anyhow!("Pull consumer on {} already closed", self.subject))?;

        // fetch() is the no-wait pull: it returns what is pending right now
        let mut batch = consumer
            .fetch()
            .max_messages(max_messages)
            .messages()
            .await
            .map_err(|e| anyhow!("Pull request failed: {}", e))?;

        let mut messages: Vec<Box<dyn PendingMessage>> = Vec::new();
        while let Some(message) = batch.next().await {
            let message = message.map_err(|e| anyhow!("Failed to receive message: {}", e))?;
            messages.push(Box::new(JetStreamMessage { inner: message }));
        }

        debug!("Pulled {} messages from {}", messages.len(), self.subject);

        Ok(messages)
    }

    async fn close(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };

        info!("Closing pull consumer {} on {}", self.consumer_name, self.subject);

        self.consumer.take();
        if let Some(stream) = self.stream.take() {
            if let Err(e) = stream.delete_consumer(&self.consumer_name).await {
                // Ephemeral consumers expire on their own once idle
                warn!("Failed to delete consumer {}: {}", self.consumer_name, e);
            }
        }

        if let Err(e) = client.flush().await {
            warn!("Failed to flush NATS connection to {}: {}", self.url, e);
        }
        // async-nats closes the connection on drop
        drop(client);

        Ok(())
    }

    fn subject(&self) -> &str {
        &self.subject
    }
}

/// Opens one NATS connection and pull consumer per playback session
pub struct NatsSourceFactory {
    url: String,
    token: Option<String>,
    connect_timeout: Duration,
}

impl NatsSourceFactory {
    pub fn new(url: String, token: Option<String>, connect_timeout: Duration) -> Self {
        Self {
            url,
            token,
            connect_timeout,
        }
    }
}

#[async_trait::async_trait]
impl SourceFactory for NatsSourceFactory {
    async fn open(&self, subject: &str) -> PipelineResult<Box<dyn PullSource>> {
        let client = NatsClient::connect(&self.url, self.token.as_deref(), self.connect_timeout).await?;
        let source = client.pull_source(subject).await?;
        Ok(Box::new(source))
    }
}
