use crate::domain::{allocate, total_packages, DonationAmount, RegistryAllocation};
use common::domain::{
    CreateUsageSnapshotInput, DecrementRemainingDonationInput, DistributeOrgDonationInput,
    DomainError, DomainResult, GetOrganizationInput, InitialState, ItemOutcome, ManifestCatalog,
    OrganizationRepository, PackageDonationRepository, RegistryKey, RegistryWeights,
    UpdateDonatedAmountInput, WeightStore, WorkItem,
};
use futures::future::{join_all, try_join_all};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};

/// What a successfully processed work item did to the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionOutcome {
    pub organization_id: String,
    pub donation_amount: DonationAmount,
    pub total_packages: usize,
    pub top_level_packages: usize,
    pub groups_credited: usize,
    pub snapshot_created: bool,
    pub manually_billed: bool,
}

/// Domain service that distributes one organization donation across packages
///
/// Flow:
/// 1. Fetch the initial state for the work item's correlation id
/// 2. Fee-adjust the amount unless it is a redistribution
/// 3. Enumerate supported (language, registry) groups
/// 4. Fetch weight maps and top-level package lists concurrently
/// 5. Allocate and write one ledger entry per credited group concurrently
/// 6. Snapshot OSS usage for organization scans
/// 7. Add new donations to the organization's total
/// 8. Decrement the remaining balance of manually billed organizations
pub struct DistributionService {
    weight_store: Arc<dyn WeightStore>,
    organization_repository: Arc<dyn OrganizationRepository>,
    package_repository: Arc<dyn PackageDonationRepository>,
    manifest_catalog: Arc<dyn ManifestCatalog>,
}

impl DistributionService {
    pub fn new(
        weight_store: Arc<dyn WeightStore>,
        organization_repository: Arc<dyn OrganizationRepository>,
        package_repository: Arc<dyn PackageDonationRepository>,
        manifest_catalog: Arc<dyn ManifestCatalog>,
    ) -> Self {
        Self {
            weight_store,
            organization_repository,
            package_repository,
            manifest_catalog,
        }
    }

    /// Run a whole batch. Items run concurrently and independently; if any
    /// fails the batch fails with every item's outcome attached.
    #[instrument(skip(self, payloads), fields(batch_size = payloads.len()))]
    pub async fn process_batch(&self, payloads: Vec<Vec<u8>>) -> DomainResult<Vec<ItemOutcome>> {
        let outcomes = join_all(
            payloads
                .iter()
                .enumerate()
                .map(|(index, payload)| self.process_payload(index, payload)),
        )
        .await;

        let total = outcomes.len();
        let failed = outcomes.iter().filter(|o| !o.is_success()).count();
        if failed > 0 {
            error!(failed, total, "work items failed in batch");
            return Err(DomainError::AggregateBatchFailure {
                failed,
                total,
                outcomes,
            });
        }

        debug!(total, "batch processed");
        Ok(outcomes)
    }

    async fn process_payload(&self, index: usize, payload: &[u8]) -> ItemOutcome {
        let item = match WorkItem::from_payload(payload) {
            Ok(item) => item,
            Err(e) => {
                warn!(index, error = %e, "rejecting malformed work item");
                return ItemOutcome::failure(index, None, &e);
            }
        };

        match self.process_work_item(&item).await {
            Ok(_) => ItemOutcome::success(index, item.correlation_id().to_string()),
            Err(e) => {
                error!(
                    index,
                    correlation_id = %item.correlation_id(),
                    error = %e,
                    "failed to distribute donation"
                );
                ItemOutcome::failure(index, Some(item.correlation_id().to_string()), &e)
            }
        }
    }

    #[instrument(skip(self, item), fields(correlation_id = %item.correlation_id()))]
    pub async fn process_work_item(&self, item: &WorkItem) -> DomainResult<DistributionOutcome> {
        let correlation_id = item.correlation_id();
        info!("processing work item");

        let state = self.weight_store.get_initial_state(correlation_id).await?;
        let donation_amount = DonationAmount::for_initial_state(&state);

        let keys = self.supported_registries();
        let (groups, top_level_packages) = tokio::try_join!(
            self.fetch_weight_maps(correlation_id, &keys),
            self.count_top_level_packages(correlation_id, &keys),
        )?;

        let total_packages = total_packages(&groups);
        info!(
            total_packages,
            "dependencies across all supported downloaded manifests"
        );

        let allocations = allocate(donation_amount, &groups);
        let groups_credited = allocations.len();
        try_join_all(
            allocations
                .into_iter()
                .map(|allocation| self.distribute(&state, allocation)),
        )
        .await?;

        let snapshot_created = state.is_organization_scan();
        if snapshot_created {
            self.organization_repository
                .create_organization_oss_usage_snapshot(CreateUsageSnapshotInput {
                    organization_id: state.organization_id.clone(),
                    total_dependencies: total_packages as i64,
                    top_level_dependencies: top_level_packages as i64,
                })
                .await?;
        }

        if !state.redistributed_donation {
            self.organization_repository
                .update_donated_amount(UpdateDonatedAmountInput {
                    organization_id: state.organization_id.clone(),
                    amount: state.amount,
                })
                .await?;
        }

        let manually_billed = self.is_manually_billed(&state.organization_id).await?;
        if manually_billed {
            info!(organization_id = %state.organization_id, "decrementing organization remaining donation");
            self.organization_repository
                .decrement_manually_billed_org_remaining_donation(DecrementRemainingDonationInput {
                    organization_id: state.organization_id.clone(),
                    amount: state.amount,
                })
                .await?;
        }

        info!(
            organization_id = %state.organization_id,
            donation_amount = donation_amount.as_millicents(),
            description = %state.description,
            "donation distributed"
        );

        Ok(DistributionOutcome {
            organization_id: state.organization_id,
            donation_amount,
            total_packages,
            top_level_packages,
            groups_credited,
            snapshot_created,
            manually_billed,
        })
    }

    fn supported_registries(&self) -> Vec<RegistryKey> {
        let mut keys: Vec<RegistryKey> = Vec::new();
        for pattern in self.manifest_catalog.supported_manifest_patterns() {
            let key = pattern.key();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    async fn fetch_weight_maps(
        &self,
        correlation_id: &str,
        keys: &[RegistryKey],
    ) -> DomainResult<Vec<RegistryWeights>> {
        try_join_all(keys.iter().map(|key| async move {
            let weights = self
                .weight_store
                .get_package_weight_map(correlation_id, key)
                .await?;
            debug!(group = %key, packages = weights.len(), "fetched package weight map");
            Ok::<_, DomainError>(RegistryWeights {
                key: key.clone(),
                weights,
            })
        }))
        .await
    }

    async fn count_top_level_packages(
        &self,
        correlation_id: &str,
        keys: &[RegistryKey],
    ) -> DomainResult<usize> {
        let lists = try_join_all(
            keys.iter()
                .map(|key| self.weight_store.get_top_level_packages(correlation_id, key)),
        )
        .await?;
        Ok(lists.iter().map(Vec::len).sum())
    }

    async fn distribute(
        &self,
        state: &InitialState,
        allocation: RegistryAllocation,
    ) -> DomainResult<()> {
        debug!(
            group = %allocation.key,
            donation_amount = allocation.donation_amount,
            packages = allocation.credits.len(),
            "crediting group"
        );
        self.package_repository
            .distribute_org_donation(DistributeOrgDonationInput {
                organization_id: state.organization_id.clone(),
                language: allocation.key.language,
                registry: allocation.key.registry,
                description: state.description.clone(),
                donation_amount: allocation.donation_amount,
                credits: allocation.credits,
            })
            .await
    }

    async fn is_manually_billed(&self, organization_id: &str) -> DomainResult<bool> {
        let org = self
            .organization_repository
            .get_org(GetOrganizationInput {
                organization_id: organization_id.to_string(),
            })
            .await?;

        match org {
            Some(org) => {
                debug!(
                    organization_id,
                    name = %org.name,
                    manually_billed = org.is_manually_billed(),
                    "fetched organization"
                );
                Ok(org.is_manually_billed())
            }
            None => {
                warn!(organization_id, "organization not found, treating as not manually billed");
                Ok(false)
            }
        }
    }
}
