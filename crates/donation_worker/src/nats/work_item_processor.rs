use crate::domain::DistributionService;
use async_nats::jetstream::Message;
use common::domain::{DomainError, ItemOutcome};
use common::nats::{BatchProcessor, ProcessingResult};
use std::sync::Arc;
use tracing::{debug, error};

/// Create a BatchProcessor that runs each fetched batch of work items through the distribution service
pub fn create_work_item_processor(service: Arc<DistributionService>) -> BatchProcessor {
    Box::new(move |messages: &[Message]| {
        let service = Arc::clone(&service);

        // Copy payloads out; messages are only borrowed for this call
        let payloads: Vec<Vec<u8>> = messages.iter().map(|msg| msg.payload.to_vec()).collect();

        Box::pin(async move { Ok(process_payloads(&service, payloads).await) })
    })
}

/// Run one batch and decide settlement per message: committed items are acked,
/// retryable failures are nak'd so only they are redelivered, and malformed
/// items are terminated
pub async fn process_payloads(
    service: &DistributionService,
    payloads: Vec<Vec<u8>>,
) -> ProcessingResult {
    let count = payloads.len();

    match service.process_batch(payloads).await {
        Ok(outcomes) => {
            debug!(count, "all work items distributed");
            ProcessingResult::ack_all(outcomes.len())
        }
        Err(DomainError::AggregateBatchFailure {
            failed,
            total,
            outcomes,
        }) => {
            let results = serde_json::to_string(&outcomes).unwrap_or_default();
            error!(failed, total, results = %results, "batch invocation failed");
            split_outcomes(outcomes)
        }
        Err(e) => {
            error!(error = %e, "batch invocation failed");
            ProcessingResult::nak_all(count, Some(e.to_string()))
        }
    }
}

fn split_outcomes(outcomes: Vec<ItemOutcome>) -> ProcessingResult {
    let mut ack = Vec::new();
    let mut nak = Vec::new();
    let mut term = Vec::new();
    for outcome in outcomes {
        match outcome.error {
            None => ack.push(outcome.index),
            Some(error) if outcome.retryable => nak.push((outcome.index, Some(error))),
            Some(error) => term.push((outcome.index, Some(error))),
        }
    }
    ProcessingResult::new(ack, nak, term)
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::domain::{
        BillingInfo, InitialState, MockManifestCatalog, MockOrganizationRepository,
        MockPackageDonationRepository, MockWeightStore, Organization, PackageWeightMap,
        SearchPattern,
    };

    fn service_for_successful_item() -> DistributionService {
        let mut org_repo = MockOrganizationRepository::new();
        org_repo
            .expect_create_organization_oss_usage_snapshot()
            .returning(|_| Ok(()));
        org_repo
            .expect_update_donated_amount()
            .returning(|_| Ok(()));
        org_repo.expect_get_org().returning(|input| {
            Ok(Some(Organization {
                id: input.organization_id,
                name: "flossbank".to_string(),
                host: None,
                installation_id: None,
                total_donated: 0,
                remaining_donation: 0,
                billing_info: BillingInfo::default(),
            }))
        });

        service_with_org_repo(org_repo)
    }

    fn service_with_org_repo(org_repo: MockOrganizationRepository) -> DistributionService {
        let mut store = MockWeightStore::new();
        store.expect_get_initial_state().returning(|correlation_id| {
            Ok(InitialState {
                organization_id: format!("org-{}", correlation_id),
                amount: 1_000_000,
                redistributed_donation: false,
                description: "testing donation".to_string(),
                target_package_id: None,
            })
        });
        store
            .expect_get_package_weight_map()
            .returning(|_, _| Ok(vec![("standard", 1.0)].into_iter().collect::<PackageWeightMap>()));
        store
            .expect_get_top_level_packages()
            .returning(|_, _| Ok(vec!["standard".to_string()]));

        let mut catalog = MockManifestCatalog::new();
        catalog
            .expect_supported_manifest_patterns()
            .return_const(vec![SearchPattern {
                language: "javascript".to_string(),
                registry: "npm".to_string(),
                patterns: vec!["package.json".to_string()],
            }]);

        let mut package_repo = MockPackageDonationRepository::new();
        package_repo
            .expect_distribute_org_donation()
            .returning(|_| Ok(()));

        DistributionService::new(
            Arc::new(store),
            Arc::new(org_repo),
            Arc::new(package_repo),
            Arc::new(catalog),
        )
    }

    #[tokio::test]
    async fn test_all_items_succeed_are_acked() {
        let service = service_for_successful_item();

        let result = process_payloads(
            &service,
            vec![
                br#"{"correlationId":"a"}"#.to_vec(),
                br#"{"correlationId":"b"}"#.to_vec(),
            ],
        )
        .await;

        assert_eq!(result, ProcessingResult::ack_all(2));
    }

    #[tokio::test]
    async fn test_malformed_items_are_terminated_and_successes_acked() {
        let service = service_for_successful_item();

        let result = process_payloads(
            &service,
            vec![
                b"not json".to_vec(),
                br#"{"correlationId":"a"}"#.to_vec(),
                br#"{"correlationId":""}"#.to_vec(),
            ],
        )
        .await;

        assert_eq!(result.ack, vec![1]);
        assert!(result.nak.is_empty());
        assert_eq!(result.term.len(), 2);
        assert_eq!(result.term[0].0, 0);
        assert_eq!(result.term[1].0, 2);
        assert!(result.term[1]
            .1
            .as_deref()
            .is_some_and(|e| e.contains("no correlation id passed in")));
    }

    #[tokio::test]
    async fn test_unknown_organization_is_still_acked() {
        // Ledger updates for an unknown organization are no-ops; the package
        // credits are already committed, so the item must not be redelivered
        let mut org_repo = MockOrganizationRepository::new();
        org_repo
            .expect_create_organization_oss_usage_snapshot()
            .times(1)
            .returning(|_| Ok(()));
        org_repo
            .expect_update_donated_amount()
            .times(1)
            .returning(|_| Ok(()));
        org_repo.expect_get_org().times(1).returning(|_| Ok(None));
        org_repo
            .expect_decrement_manually_billed_org_remaining_donation()
            .times(0);

        let service = service_with_org_repo(org_repo);

        let result = process_payloads(&service, vec![br#"{"correlationId":"gone"}"#.to_vec()]).await;

        assert_eq!(result, ProcessingResult::ack_all(1));
    }

    #[tokio::test]
    async fn test_empty_batch_acks_nothing() {
        let service = service_for_successful_item();

        let result = process_payloads(&service, Vec::new()).await;

        assert_eq!(result, ProcessingResult::default());
    }

    #[test]
    fn test_split_outcomes() {
        let outcomes = vec![
            ItemOutcome::success(0, "a".to_string()),
            ItemOutcome::failure(
                1,
                Some("b".to_string()),
                &DomainError::MalformedInput("bad".to_string()),
            ),
            ItemOutcome::failure(
                2,
                Some("c".to_string()),
                &DomainError::ledger_write("update_donated_amount", anyhow::anyhow!("timeout")),
            ),
        ];

        let result = split_outcomes(outcomes);

        assert_eq!(result.ack, vec![0]);
        assert_eq!(
            result.term,
            vec![(1, Some("Malformed work item: bad".to_string()))]
        );
        assert_eq!(
            result.nak,
            vec![(
                2,
                Some("Ledger write failed during update_donated_amount: timeout".to_string())
            )]
        );
    }
}
