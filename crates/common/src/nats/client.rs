use crate::nats::object_store::NatsObjectStoreClient;
use crate::nats::traits::{JetStreamConsumer, PullConsumer};
use anyhow::{Context, Result};
use async_nats::jetstream::{self, stream::Config as StreamConfig};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct NatsClient {
    client: async_nats::Client,
    jetstream: jetstream::Context,
}

impl NatsClient {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self> {
        info!(url = %url, timeout_ms = timeout.as_millis(), "Connecting to NATS");

        let client = async_nats::ConnectOptions::new()
            .connection_timeout(timeout)
            .connect(url)
            .await
            .context("Failed to connect to NATS")?;

        info!("Successfully connected to NATS");
        Ok(Self {
            jetstream: jetstream::new(client.clone()),
            client,
        })
    }

    /// Make sure the stream work items are published to exists
    pub async fn ensure_stream(&self, stream_name: &str, subject: &str) -> Result<()> {
        info!(stream = %stream_name, subject = %subject, "Ensuring stream exists");

        match self.jetstream.get_stream(stream_name).await {
            Ok(_) => {
                info!(stream = %stream_name, "Stream already exists");
            }
            Err(_) => {
                self.jetstream
                    .create_stream(StreamConfig {
                        name: stream_name.to_string(),
                        subjects: vec![subject.to_string()],
                        description: Some("Organization donation distribution requests".to_string()),
                        ..Default::default()
                    })
                    .await
                    .context("Failed to create stream")?;
                info!(stream = %stream_name, "Created stream");
            }
        }

        Ok(())
    }

    /// Create a JetStreamConsumer trait object from this client
    pub fn create_consumer_client(&self) -> Arc<dyn JetStreamConsumer> {
        Arc::new(NatsJetStreamConsumer::new(self.jetstream.clone()))
    }

    /// Open the object store bucket holding precomputed donation state
    pub async fn object_store(&self, bucket_name: &str) -> Result<NatsObjectStoreClient> {
        NatsObjectStoreClient::new(&self.jetstream, bucket_name).await
    }

    /// Flush anything still buffered; the connection closes when dropped
    pub async fn close(self) {
        info!("Closing NATS connection");
        if let Err(e) = self.client.flush().await {
            warn!(error = %e, "Failed to flush NATS connection");
        }
    }
}

/// Concrete implementation of JetStreamConsumer using async-nats
pub struct NatsJetStreamConsumer {
    context: jetstream::Context,
}

impl NatsJetStreamConsumer {
    pub fn new(context: jetstream::Context) -> Self {
        Self { context }
    }
}

#[async_trait]
impl JetStreamConsumer for NatsJetStreamConsumer {
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>> {
        let consumer = self
            .context
            .create_consumer_on_stream(config, stream_name)
            .await
            .context("Failed to create consumer")?;

        Ok(Box::new(NatsPullConsumer { consumer }))
    }
}

/// Concrete implementation of PullConsumer using async-nats
pub struct NatsPullConsumer {
    consumer: jetstream::consumer::PullConsumer,
}

#[async_trait]
impl PullConsumer for NatsPullConsumer {
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: Duration,
    ) -> Result<Vec<jetstream::Message>> {
        use futures::StreamExt;

        let mut messages = self
            .consumer
            .fetch()
            .max_messages(max_messages)
            .expires(expires)
            .messages()
            .await
            .context("Failed to fetch messages")?;

        let mut result = Vec::new();
        while let Some(msg) = messages.next().await {
            match msg {
                Ok(message) => result.push(message),
                Err(e) => {
                    warn!(error = %e, "Error receiving message from batch");
                }
            }
        }
        Ok(result)
    }
}
