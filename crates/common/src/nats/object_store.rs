use crate::nats::traits::BlobStore;
use anyhow::{Context, Result};
use async_nats::jetstream;
use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tracing::debug;

pub struct NatsObjectStoreClient {
    store: jetstream::object_store::ObjectStore,
}

impl NatsObjectStoreClient {
    pub async fn new(jetstream: &jetstream::Context, bucket_name: &str) -> Result<Self> {
        debug!(bucket = %bucket_name, "initializing object store client");

        let store = match jetstream.get_object_store(bucket_name).await {
            Ok(store) => store,
            Err(_) => {
                debug!(bucket = %bucket_name, "creating object store bucket");
                jetstream
                    .create_object_store(jetstream::object_store::Config {
                        bucket: bucket_name.to_string(),
                        ..Default::default()
                    })
                    .await
                    .context("failed to create object store bucket")?
            }
        };

        Ok(Self { store })
    }
}

#[async_trait]
impl BlobStore for NatsObjectStoreClient {
    async fn download(&self, key: &str) -> Result<bytes::Bytes> {
        let mut object = self
            .store
            .get(key)
            .await
            .with_context(|| format!("failed to get object {}", key))?;

        let mut buf = Vec::new();
        object
            .read_to_end(&mut buf)
            .await
            .with_context(|| format!("failed to read object {}", key))?;

        debug!(key = %key, size = buf.len(), "downloaded object");
        Ok(bytes::Bytes::from(buf))
    }
}
