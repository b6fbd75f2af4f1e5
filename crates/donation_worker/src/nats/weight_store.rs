use async_trait::async_trait;
use common::domain::{
    DomainError, DomainResult, InitialState, PackageWeightMap, RegistryKey, WeightStore,
};
use common::nats::BlobStore;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Key of the initial state blob for a correlation id
pub fn initial_state_key(correlation_id: &str) -> String {
    format!("{}/initial_state.json", correlation_id)
}

/// Key of a group's package weight map blob
pub fn package_weight_map_key(correlation_id: &str, key: &RegistryKey) -> String {
    format!("{}/{}_package_weight_map.json", correlation_id, key)
}

/// Key of a group's top-level package list blob
pub fn top_level_packages_key(correlation_id: &str, key: &RegistryKey) -> String {
    format!("{}/{}_top_level_packages.json", correlation_id, key)
}

/// WeightStore backed by a JetStream object store bucket of JSON blobs
pub struct ObjectStoreWeightStore {
    store: Arc<dyn BlobStore>,
}

impl ObjectStoreWeightStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    async fn fetch_json<T: DeserializeOwned>(&self, key: String) -> DomainResult<T> {
        let body = match self.store.download(&key).await {
            Ok(body) => body,
            Err(e) => return Err(DomainError::upstream(key, e)),
        };

        match serde_json::from_slice(&body) {
            Ok(value) => {
                debug!(key = %key, size = body.len(), "fetched weight store blob");
                Ok(value)
            }
            Err(e) => Err(DomainError::upstream(key, e)),
        }
    }
}

#[async_trait]
impl WeightStore for ObjectStoreWeightStore {
    #[instrument(skip(self))]
    async fn get_initial_state(&self, correlation_id: &str) -> DomainResult<InitialState> {
        self.fetch_json(initial_state_key(correlation_id)).await
    }

    #[instrument(skip(self), fields(group = %key))]
    async fn get_package_weight_map(
        &self,
        correlation_id: &str,
        key: &RegistryKey,
    ) -> DomainResult<PackageWeightMap> {
        let entries: Vec<(String, f64)> = self
            .fetch_json(package_weight_map_key(correlation_id, key))
            .await?;
        Ok(entries.into_iter().collect())
    }

    #[instrument(skip(self), fields(group = %key))]
    async fn get_top_level_packages(
        &self,
        correlation_id: &str,
        key: &RegistryKey,
    ) -> DomainResult<Vec<String>> {
        self.fetch_json(top_level_packages_key(correlation_id, key))
            .await
    }
}
