use crate::domain::{DistributionService, StaticManifestCatalog};
use crate::nats::{create_work_item_processor, ObjectStoreWeightStore};
use common::domain::{ManifestCatalog, OrganizationRepository, PackageDonationRepository};
use common::{NatsClient, NatsConsumer};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct DonationWorkerConfig {
    pub work_item_stream: String,
    pub work_item_subject: String,
    pub consumer_name: String,
    pub object_store_bucket: String,
    pub nats_batch_size: usize,
    pub nats_batch_wait_secs: u64,
}

/// Consumes donation work items from JetStream and distributes them
pub struct DonationWorker {
    consumer: NatsConsumer,
}

impl DonationWorker {
    pub async fn new(
        organization_repository: Arc<dyn OrganizationRepository>,
        package_repository: Arc<dyn PackageDonationRepository>,
        nats_client: Arc<NatsClient>,
        config: DonationWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("Initializing donation worker");

        let blob_store = nats_client.object_store(&config.object_store_bucket).await?;
        let weight_store = Arc::new(ObjectStoreWeightStore::new(Arc::new(blob_store)));
        let manifest_catalog: Arc<dyn ManifestCatalog> = Arc::new(StaticManifestCatalog::default());

        let service = Arc::new(DistributionService::new(
            weight_store,
            organization_repository,
            package_repository,
            manifest_catalog,
        ));

        let processor = create_work_item_processor(service);
        let consumer = NatsConsumer::new(
            nats_client.create_consumer_client(),
            &config.work_item_stream,
            &config.consumer_name,
            &config.work_item_subject,
            config.nats_batch_size,
            config.nats_batch_wait_secs,
            processor,
        )
        .await?;

        info!(
            stream = %config.work_item_stream,
            bucket = %config.object_store_bucket,
            "Donation worker initialized"
        );

        Ok(Self { consumer })
    }

    /// Consume until the token is cancelled; the in-flight batch finishes first
    pub async fn run(self, ctx: CancellationToken) -> anyhow::Result<()> {
        self.consumer.run(ctx).await
    }
}
