use crate::domain::{DomainError, DomainResult};
use serde::Deserialize;

/// A single donation distribution request
/// Identifies the bundle of precomputed state held in the weight store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    correlation_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkItemPayload {
    correlation_id: Option<String>,
}

impl WorkItem {
    pub fn new(correlation_id: impl Into<String>) -> DomainResult<Self> {
        let correlation_id = correlation_id.into();
        if correlation_id.trim().is_empty() {
            return Err(DomainError::MalformedInput(
                "no correlation id passed in".to_string(),
            ));
        }
        Ok(Self { correlation_id })
    }

    /// Parse a JSON work item as delivered by the queue
    pub fn from_payload(payload: &[u8]) -> DomainResult<Self> {
        let parsed: WorkItemPayload = serde_json::from_slice(payload)
            .map_err(|e| DomainError::MalformedInput(format!("invalid work item payload: {}", e)))?;

        Self::new(parsed.correlation_id.unwrap_or_default())
    }

    pub fn correlation_id(&self) -> &str {
        &self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_payload_success() {
        let item = WorkItem::from_payload(br#"{"correlationId":"asdf"}"#).unwrap();
        assert_eq!(item.correlation_id(), "asdf");
    }

    #[test]
    fn test_from_payload_missing_correlation_id() {
        let result = WorkItem::from_payload(br#"{"somethingElse":"asdf"}"#);
        assert!(matches!(result, Err(DomainError::MalformedInput(_))));
    }

    #[test]
    fn test_from_payload_empty_correlation_id() {
        let result = WorkItem::from_payload(br#"{"correlationId":"  "}"#);
        assert!(matches!(result, Err(DomainError::MalformedInput(_))));
    }

    #[test]
    fn test_from_payload_invalid_json() {
        let result = WorkItem::from_payload(b"not json");
        match result {
            Err(DomainError::MalformedInput(msg)) => {
                assert!(msg.starts_with("invalid work item payload"))
            }
            other => panic!("expected MalformedInput, got {:?}", other),
        }
    }
}
