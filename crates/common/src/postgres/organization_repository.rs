use crate::domain::{
    BillingInfo, CreateUsageSnapshotInput, DecrementRemainingDonationInput, DomainError,
    DomainResult, GetOrganizationInput, Organization, OrganizationRepository,
    UpdateDonatedAmountInput,
};
use crate::postgres::PostgresClient;
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

/// PostgreSQL implementation of OrganizationRepository.
/// Balances change through single `SET x = x + $n` statements so concurrent
/// work items for the same organization never lose updates.
#[derive(Clone)]
pub struct PostgresOrganizationRepository {
    client: PostgresClient,
}

impl PostgresOrganizationRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }

    async fn adjust_balance(
        &self,
        operation: &'static str,
        sql: &str,
        organization_id: &str,
        delta: i64,
    ) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(|e| DomainError::ledger_write(operation, e))?;

        let rows_affected = conn
            .execute(sql, &[&delta, &Utc::now(), &organization_id])
            .await
            .map_err(|e| DomainError::ledger_write(operation, e))?;

        // Unknown organization: nothing to update, the item still settles
        if rows_affected == 0 {
            warn!(organization_id, operation, "organization not found, balance unchanged");
        }

        Ok(())
    }
}

#[async_trait]
impl OrganizationRepository for PostgresOrganizationRepository {
    #[instrument(skip(self), fields(organization_id = %input.organization_id))]
    async fn get_org(&self, input: GetOrganizationInput) -> DomainResult<Option<Organization>> {
        info!("Retrieving org from DB");

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let row = conn
            .query_opt(
                "SELECT id, name, host, installation_id, total_donated, remaining_donation, manually_billed
                 FROM organizations
                 WHERE id = $1",
                &[&input.organization_id],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        Ok(row.map(|row| Organization {
            id: row.get("id"),
            name: row.get("name"),
            host: row.get("host"),
            installation_id: row.get("installation_id"),
            total_donated: row.get("total_donated"),
            remaining_donation: row.get("remaining_donation"),
            billing_info: BillingInfo {
                manually_billed: row.get("manually_billed"),
            },
        }))
    }

    #[instrument(skip(self), fields(organization_id = %input.organization_id, amount = input.amount))]
    async fn update_donated_amount(&self, input: UpdateDonatedAmountInput) -> DomainResult<()> {
        self.adjust_balance(
            "update_donated_amount",
            "UPDATE organizations
             SET total_donated = total_donated + $1, updated_at = $2
             WHERE id = $3",
            &input.organization_id,
            input.amount,
        )
        .await?;

        debug!("Organization donated total incremented");
        Ok(())
    }

    #[instrument(skip(self), fields(organization_id = %input.organization_id, amount = input.amount))]
    async fn decrement_manually_billed_org_remaining_donation(
        &self,
        input: DecrementRemainingDonationInput,
    ) -> DomainResult<()> {
        self.adjust_balance(
            "decrement_manually_billed_org_remaining_donation",
            "UPDATE organizations
             SET remaining_donation = remaining_donation - $1, updated_at = $2
             WHERE id = $3",
            &input.organization_id,
            input.amount,
        )
        .await?;

        debug!("Organization remaining donation decremented");
        Ok(())
    }

    #[instrument(skip(self), fields(organization_id = %input.organization_id))]
    async fn create_organization_oss_usage_snapshot(
        &self,
        input: CreateUsageSnapshotInput,
    ) -> DomainResult<()> {
        const OPERATION: &str = "create_organization_oss_usage_snapshot";

        let conn = self
            .client
            .get_connection()
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        // Insert-select keeps the existence check and the append in one statement
        let rows_affected = conn
            .execute(
                "INSERT INTO organization_usage_snapshots
                     (organization_id, total_dependencies, top_level_dependencies, taken_at)
                 SELECT id, $2, $3, $4 FROM organizations WHERE id = $1",
                &[
                    &input.organization_id,
                    &input.total_dependencies,
                    &input.top_level_dependencies,
                    &Utc::now(),
                ],
            )
            .await
            .map_err(|e| DomainError::ledger_write(OPERATION, e))?;

        if rows_affected == 0 {
            warn!(
                organization_id = %input.organization_id,
                "organization not found, usage snapshot skipped"
            );
            return Ok(());
        }

        debug!(
            total_dependencies = input.total_dependencies,
            top_level_dependencies = input.top_level_dependencies,
            "OSS usage snapshot recorded"
        );
        Ok(())
    }
}
