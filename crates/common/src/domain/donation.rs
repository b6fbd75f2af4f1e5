use serde::{Deserialize, Serialize};

/// Precomputed state describing one donation, stored alongside the weight maps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialState {
    pub organization_id: String,
    /// Gross donation in millicents
    pub amount: i64,
    /// Set when fees were already deducted by an earlier distribution
    #[serde(default)]
    pub redistributed_donation: bool,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub target_package_id: Option<String>,
}

impl InitialState {
    /// True when the donation came from scanning the organization's repositories
    /// rather than from a single-package donation flow
    pub fn is_organization_scan(&self) -> bool {
        self.target_package_id
            .as_deref()
            .is_none_or(|id| id.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_minimal_initial_state() {
        let state: InitialState =
            serde_json::from_str(r#"{"organizationId":"flossbank-id","amount":1000}"#).unwrap();

        assert_eq!(state.organization_id, "flossbank-id");
        assert_eq!(state.amount, 1000);
        assert!(!state.redistributed_donation);
        assert_eq!(state.description, "");
        assert!(state.is_organization_scan());
    }

    #[test]
    fn test_target_package_id_suppresses_scan() {
        let state: InitialState = serde_json::from_str(
            r#"{"organizationId":"o","amount":1,"targetPackageId":"aaaaaaaaaaaa","redistributedDonation":true}"#,
        )
        .unwrap();

        assert!(state.redistributed_donation);
        assert!(!state.is_organization_scan());
    }

    #[test]
    fn test_empty_target_package_id_is_scan() {
        let state: InitialState = serde_json::from_str(
            r#"{"organizationId":"o","amount":1,"targetPackageId":""}"#,
        )
        .unwrap();

        assert!(state.is_organization_scan());
    }
}
