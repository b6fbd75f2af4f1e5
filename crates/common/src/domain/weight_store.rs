use crate::domain::{DomainResult, InitialState, PackageWeightMap, RegistryKey};
use async_trait::async_trait;

/// Read access to the precomputed state bundle of a work item
/// Every failure (transport, missing key, malformed content) is an UpstreamFetchFailure
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait WeightStore: Send + Sync {
    async fn get_initial_state(&self, correlation_id: &str) -> DomainResult<InitialState>;

    async fn get_package_weight_map(
        &self,
        correlation_id: &str,
        key: &RegistryKey,
    ) -> DomainResult<PackageWeightMap>;

    /// Names of the packages declared directly in the group's manifests
    async fn get_top_level_packages(
        &self,
        correlation_id: &str,
        key: &RegistryKey,
    ) -> DomainResult<Vec<String>>;
}
