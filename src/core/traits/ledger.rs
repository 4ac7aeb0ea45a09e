use crate::core::domain::{LedgerEntry, RecordOutcome};

#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("ledger io error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("identity {0:?} cannot be stored in the ledger")]
    InvalidIdentity(String),
    #[error("ledger is closed")]
    Closed,
    #[error("ledger task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// Durable, identity-deduplicated record of first full completions.
#[mockall::automock]
#[async_trait::async_trait]
pub trait CompletionLedger: std::fmt::Debug + Send + Sync {
    /// Appends an entry for `identity` unless one already exists.
    /// Read, check, append and persist happen as one critical section.
    async fn record_if_first(&self, identity: &str) -> Result<RecordOutcome, LedgerError>;

    /// Entries, newest first.
    async fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError>;

    async fn clear(&self) -> Result<(), LedgerError>;
}
