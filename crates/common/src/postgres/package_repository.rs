use crate::domain::{
    DistributeOrgDonationInput, DomainError, DomainResult, PackageDonationRepository,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument};

const OPERATION: &str = "distribute_org_donation";

/// PostgreSQL implementation of PackageDonationRepository
#[derive(Clone)]
pub struct PostgresPackageDonationRepository {
    client: PostgresClient,
}

impl PostgresPackageDonationRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PackageDonationRepository for PostgresPackageDonationRepository {
    #[instrument(
        skip(self, input),
        fields(
            organization_id = %input.organization_id,
            language = %input.language,
            registry = %input.registry,
            package_count = input.credits.len(),
        )
    )]
    async fn distribute_org_donation(&self, input: DistributeOrgDonationInput) -> DomainResult<()> {
        // No credits means no supported manifest was found for this language and registry
        if input.credits.is_empty() {
            return Ok(());
        }

        info!(description = %input.description, "Distributing invoice");
        info!(
            donation_amount = input.donation_amount,
            package_count = input.credits.len(),
            "Distributing donation to packages"
        );

        let mut conn = self
            .client
            .get_connection()
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        let tx = conn
            .transaction()
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        let upsert_package = tx
            .prepare_cached(
                "INSERT INTO packages (registry, language, name)
                 VALUES ($1, $2, $3)
                 ON CONFLICT (registry, language, name) DO UPDATE SET name = EXCLUDED.name
                 RETURNING id",
            )
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        let insert_revenue = tx
            .prepare_cached(
                "INSERT INTO package_donation_revenue
                     (id, package_id, organization_id, description, amount, donated_at)
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        // Upsert in name order so concurrent transactions lock package rows consistently
        let mut credits = input.credits;
        credits.sort_by(|a, b| a.name.cmp(&b.name));

        let donated_at = Utc::now();
        for credit in &credits {
            let row = tx
                .query_one(
                    &upsert_package,
                    &[&input.registry, &input.language, &credit.name],
                )
                .await
                .map_err(|e| DomainError::ledger_write(OPERATION, e))?;
            let package_id: i64 = row.get(0);

            tx.execute(
                &insert_revenue,
                &[
                    &xid::new().to_string(),
                    &package_id,
                    &input.organization_id,
                    &input.description,
                    &credit.amount,
                    &donated_at,
                ],
            )
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;
        }

        tx.commit()
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        debug!(package_count = credits.len(), "Package revenue recorded");
        Ok(())
    }
}
