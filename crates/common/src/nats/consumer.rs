use crate::nats::traits::{JetStreamConsumer, PullConsumer};
use anyhow::Result;
use async_nats::jetstream::{self, AckKind, Message};
use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Deliveries per message before JetStream stops redelivering it
pub const MAX_DELIVER: i64 = 5;

/// Redelivery delay for rejected messages
pub const NAK_DELAY: Duration = Duration::from_secs(5);

/// Outcome of one batch, by message index within the batch
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ProcessingResult {
    /// Messages to acknowledge
    pub ack: Vec<usize>,
    /// Messages to reject for redelivery, with the reason when known
    pub nak: Vec<(usize, Option<String>)>,
    /// Messages that can never succeed; terminated without redelivery
    pub term: Vec<(usize, Option<String>)>,
}

impl ProcessingResult {
    pub fn ack_all(count: usize) -> Self {
        Self {
            ack: (0..count).collect(),
            ..Default::default()
        }
    }

    pub fn nak_all(count: usize, error: Option<String>) -> Self {
        Self {
            nak: (0..count).map(|i| (i, error.clone())).collect(),
            ..Default::default()
        }
    }

    pub fn new(
        ack: Vec<usize>,
        nak: Vec<(usize, Option<String>)>,
        term: Vec<(usize, Option<String>)>,
    ) -> Self {
        Self { ack, nak, term }
    }
}

/// Batch processor: decodes and handles a fetched batch, deciding ack/nak per message
pub type BatchProcessor =
    Box<dyn Fn(&[Message]) -> BoxFuture<'static, Result<ProcessingResult>> + Send + Sync>;

/// Durable JetStream pull consumer that hands each fetched batch to a processor
pub struct NatsConsumer {
    consumer: Box<dyn PullConsumer>,
    batch_size: usize,
    max_wait: Duration,
    processor: BatchProcessor,
}

impl NatsConsumer {
    pub async fn new(
        client: Arc<dyn JetStreamConsumer>,
        stream_name: &str,
        consumer_name: &str,
        subject_filter: &str,
        batch_size: usize,
        max_wait_secs: u64,
        processor: BatchProcessor,
    ) -> Result<Self> {
        debug!(
            stream = stream_name,
            consumer = consumer_name,
            subject = subject_filter,
            "Creating JetStream consumer"
        );

        let consumer = client
            .create_consumer(
                jetstream::consumer::pull::Config {
                    name: Some(consumer_name.to_string()),
                    durable_name: Some(consumer_name.to_string()),
                    filter_subject: subject_filter.to_string(),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    max_deliver: MAX_DELIVER,
                    ..Default::default()
                },
                stream_name,
            )
            .await?;

        info!(
            stream = stream_name,
            consumer = consumer_name,
            "Consumer created successfully"
        );

        Ok(Self {
            consumer,
            batch_size,
            max_wait: Duration::from_secs(max_wait_secs),
            processor,
        })
    }

    /// Fetch and process batches until the token is cancelled.
    /// A batch in flight is finished before the loop exits.
    pub async fn run(&self, ctx: CancellationToken) -> Result<()> {
        info!("Starting consumer loop");

        while !ctx.is_cancelled() {
            let messages = tokio::select! {
                _ = ctx.cancelled() => break,
                result = self.consumer.fetch_messages(self.batch_size, self.max_wait) => result,
            };

            match messages {
                Ok(messages) => self.process_batch(messages).await,
                Err(e) => {
                    error!(error = %e, "Error fetching batch");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        }

        info!("Consumer stopped gracefully");
        Ok(())
    }

    async fn process_batch(&self, messages: Vec<Message>) {
        if messages.is_empty() {
            debug!("No messages in batch");
            return;
        }

        debug!(message_count = messages.len(), "Received message batch");

        let processing_result = match (self.processor)(&messages).await {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Processor returned error, rejecting all messages");
                ProcessingResult::nak_all(messages.len(), Some(e.to_string()))
            }
        };

        for idx in &processing_result.ack {
            settle(&messages, *idx, AckKind::Ack, "ack").await;
        }

        for (idx, reason) in &processing_result.nak {
            if let Some(msg) = messages.get(*idx) {
                warn!(
                    message_index = idx,
                    subject = %msg.subject,
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "Rejecting message for redelivery"
                );
            }
            settle(&messages, *idx, AckKind::Nak(Some(NAK_DELAY)), "nak").await;
        }

        for (idx, reason) in &processing_result.term {
            if let Some(msg) = messages.get(*idx) {
                warn!(
                    message_index = idx,
                    subject = %msg.subject,
                    reason = reason.as_deref().unwrap_or("unknown"),
                    "Terminating message, it will not be redelivered"
                );
            }
            settle(&messages, *idx, AckKind::Term, "term").await;
        }

        debug!(
            ack_count = processing_result.ack.len(),
            nak_count = processing_result.nak.len(),
            term_count = processing_result.term.len(),
            "Batch settled"
        );
    }
}

async fn settle(messages: &[Message], idx: usize, kind: AckKind, label: &'static str) {
    match messages.get(idx) {
        Some(msg) => {
            if let Err(e) = msg.ack_with(kind).await {
                error!(error = %e, message_index = idx, kind = label, "Failed to settle message");
            }
        }
        None => warn!(
            message_index = idx,
            batch_size = messages.len(),
            kind = label,
            "Invalid index in ProcessingResult"
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nats::traits::{MockJetStreamConsumer, MockPullConsumer};

    fn noop_processor() -> BatchProcessor {
        Box::new(|messages: &[Message]| {
            let count = messages.len();
            Box::pin(async move { Ok(ProcessingResult::ack_all(count)) })
        })
    }

    #[test]
    fn test_processing_result_helpers() {
        assert_eq!(ProcessingResult::ack_all(3).ack, vec![0, 1, 2]);

        let rejected = ProcessingResult::nak_all(2, Some("boom".to_string()));
        assert!(rejected.ack.is_empty());
        assert!(rejected.term.is_empty());
        assert_eq!(
            rejected.nak,
            vec![(0, Some("boom".to_string())), (1, Some("boom".to_string()))]
        );
    }

    #[tokio::test]
    async fn test_new_creates_durable_explicit_ack_consumer() {
        let mut mock_client = MockJetStreamConsumer::new();
        mock_client
            .expect_create_consumer()
            .withf(|config, stream| {
                stream.to_string() == "org_donations"
                    && config.durable_name.as_deref() == Some("org-donation-distributor")
                    && config.filter_subject == "org_donations.>"
                    && config.ack_policy == jetstream::consumer::AckPolicy::Explicit
                    && config.max_deliver == MAX_DELIVER
            })
            .times(1)
            .return_once(|_, _| Ok(Box::new(MockPullConsumer::new())));

        let consumer = NatsConsumer::new(
            Arc::new(mock_client),
            "org_donations",
            "org-donation-distributor",
            "org_donations.>",
            10,
            5,
            noop_processor(),
        )
        .await
        .unwrap();

        assert_eq!(consumer.batch_size, 10);
        assert_eq!(consumer.max_wait, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_new_propagates_creation_failure() {
        let mut mock_client = MockJetStreamConsumer::new();
        mock_client
            .expect_create_consumer()
            .return_once(|_, _| Err(anyhow::anyhow!("stream not found")));

        let result = NatsConsumer::new(
            Arc::new(mock_client),
            "missing",
            "consumer",
            "missing.>",
            10,
            5,
            noop_processor(),
        )
        .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_stops_when_cancelled() {
        let mut mock_pull = MockPullConsumer::new();
        mock_pull
            .expect_fetch_messages()
            .returning(|_, _| Ok(Vec::new()));

        let mut mock_client = MockJetStreamConsumer::new();
        mock_client
            .expect_create_consumer()
            .return_once(move |_, _| Ok(Box::new(mock_pull)));

        let consumer = NatsConsumer::new(
            Arc::new(mock_client),
            "org_donations",
            "consumer",
            "org_donations.>",
            10,
            1,
            noop_processor(),
        )
        .await
        .unwrap();

        let token = CancellationToken::new();
        token.cancel();

        let result = tokio::time::timeout(Duration::from_secs(2), consumer.run(token)).await;
        assert!(matches!(result, Ok(Ok(()))));
    }
}
