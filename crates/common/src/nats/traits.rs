use anyhow::Result;
use async_nats::jetstream;
use async_trait::async_trait;

/// Trait for JetStream consumer operations
/// Abstracts creation of the durable pull consumer work items arrive on
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait JetStreamConsumer: Send + Sync {
    /// Create (or bind to) a durable pull consumer on a stream
    async fn create_consumer(
        &self,
        config: jetstream::consumer::pull::Config,
        stream_name: &str,
    ) -> Result<Box<dyn PullConsumer>>;
}

/// Trait for pull consumer operations
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PullConsumer: Send + Sync {
    /// Fetch up to max_messages, waiting at most `expires`
    async fn fetch_messages(
        &self,
        max_messages: usize,
        expires: std::time::Duration,
    ) -> Result<Vec<jetstream::Message>>;
}

/// Read access to a key/value blob bucket
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Download the full content stored under `key`
    async fn download(&self, key: &str) -> Result<bytes::Bytes>;
}
