use serde::Serialize;
use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed work item: {0}")]
    MalformedInput(String),

    #[error("Failed to fetch {key} from weight store: {source:#}")]
    UpstreamFetchFailure {
        key: String,
        source: anyhow::Error,
    },

    #[error("Ledger write failed during {operation}: {source:#}")]
    LedgerWriteFailure {
        operation: &'static str,
        source: anyhow::Error,
    },

    #[error("{failed} of {total} work items failed")]
    AggregateBatchFailure {
        failed: usize,
        total: usize,
        outcomes: Vec<ItemOutcome>,
    },

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

impl DomainError {
    pub fn upstream(key: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        DomainError::UpstreamFetchFailure {
            key: key.into(),
            source: source.into(),
        }
    }

    pub fn ledger_write(operation: &'static str, source: impl Into<anyhow::Error>) -> Self {
        DomainError::LedgerWriteFailure {
            operation,
            source: source.into(),
        }
    }

    /// Malformed input fails the same way on every delivery
    pub fn is_retryable(&self) -> bool {
        !matches!(self, DomainError::MalformedInput(_))
    }
}

/// Result of a single work item within a batch, kept for observability
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemOutcome {
    pub index: usize,
    pub correlation_id: Option<String>,
    pub error: Option<String>,
    pub retryable: bool,
}

impl ItemOutcome {
    pub fn success(index: usize, correlation_id: String) -> Self {
        Self {
            index,
            correlation_id: Some(correlation_id),
            error: None,
            retryable: false,
        }
    }

    pub fn failure(index: usize, correlation_id: Option<String>, error: &DomainError) -> Self {
        Self {
            index,
            correlation_id,
            error: Some(error.to_string()),
            retryable: error.is_retryable(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}
