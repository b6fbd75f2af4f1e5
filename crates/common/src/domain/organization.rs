use crate::domain::DomainResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingInfo {
    pub manually_billed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub host: Option<String>,
    pub installation_id: Option<String>,
    /// Lifetime donations in millicents, before fees
    pub total_donated: i64,
    /// Pre-funded balance left for manually billed organizations
    pub remaining_donation: i64,
    pub billing_info: BillingInfo,
}

impl Organization {
    pub fn is_manually_billed(&self) -> bool {
        self.billing_info.manually_billed
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GetOrganizationInput {
    pub organization_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateDonatedAmountInput {
    pub organization_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecrementRemainingDonationInput {
    pub organization_id: String,
    pub amount: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateUsageSnapshotInput {
    pub organization_id: String,
    pub total_dependencies: i64,
    pub top_level_dependencies: i64,
}

/// Repository trait for organization ledger operations
/// Every mutation must be a single atomic increment or append in the store
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait OrganizationRepository: Send + Sync {
    /// Get an organization by ID, None if it does not exist
    async fn get_org(&self, input: GetOrganizationInput) -> DomainResult<Option<Organization>>;

    /// Atomically add to the organization's lifetime donated total
    async fn update_donated_amount(&self, input: UpdateDonatedAmountInput) -> DomainResult<()>;

    /// Atomically subtract from a manually billed organization's remaining balance
    async fn decrement_manually_billed_org_remaining_donation(
        &self,
        input: DecrementRemainingDonationInput,
    ) -> DomainResult<()>;

    /// Append an OSS usage snapshot stamped with the current time
    async fn create_organization_oss_usage_snapshot(
        &self,
        input: CreateUsageSnapshotInput,
    ) -> DomainResult<()>;
}
