use crate::core::domain::{ExecutionOutcome, Invocation};

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("failed to launch {program}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to wait for {program}: {source}")]
    Wait {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Spawns a single process and reports how it ended.
///
/// A non-zero exit status or a timeout is not an error: both are recorded in
/// the returned [`ExecutionOutcome`]. `Err` means the process could not be
/// started or supervised at all.
#[mockall::automock]
#[async_trait::async_trait]
pub trait ProcessRunner: std::fmt::Debug + Send + Sync {
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutcome, RunError>;
}
