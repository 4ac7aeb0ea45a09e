use std::sync::Arc;

use crate::core::{
    domain::{JudgeLimits, JudgeRequest, JudgeResult},
    pipeline,
    toolchain::{ToolchainRegistry, ToolchainSpec},
    traits::{
        ledger::CompletionLedger,
        runner::{ProcessRunner, RunError},
    },
    workspace::{Workspace, WorkspaceError, WorkspaceManager},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Unsupported language: {0}")]
    UnsupportedLanguage(String),
    #[error("At least one test case is required")]
    NoTestCases,
    #[error("Identity must not contain line breaks")]
    MultilineIdentity,
    #[error("Identity is required for a final completion")]
    MissingIdentity,
}

/// Failures that prevent a judgment from being produced at all.
/// Compile errors and failing test cases are not here: they are part of a
/// normal [`JudgeResult`].
#[derive(Debug, thiserror::Error)]
pub enum JudgeError {
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Workspace(#[from] WorkspaceError),
    #[error("Toolchain unavailable: {0}")]
    Launch(#[from] RunError),
}

/// Entry point of the engine. Cheap to clone; every judgment gets its own
/// workspace, and the ledger handle is the only shared state.
#[derive(Debug, Clone)]
pub struct Judge {
    registry: Arc<ToolchainRegistry>,
    workspaces: WorkspaceManager,
    runner: Arc<dyn ProcessRunner>,
    ledger: Arc<dyn CompletionLedger>,
    limits: JudgeLimits,
}

impl Judge {
    pub fn new(
        registry: Arc<ToolchainRegistry>,
        workspaces: WorkspaceManager,
        runner: Arc<dyn ProcessRunner>,
        ledger: Arc<dyn CompletionLedger>,
        limits: JudgeLimits,
    ) -> Self {
        Self {
            registry,
            workspaces,
            runner,
            ledger,
            limits,
        }
    }

    pub fn ledger(&self) -> &Arc<dyn CompletionLedger> {
        &self.ledger
    }

    #[tracing::instrument(
        skip_all,
        fields(
            language = %request.language,
            identity = %request.identity,
            cases = request.test_cases.len()
        )
    )]
    pub async fn judge(&self, request: &JudgeRequest) -> Result<JudgeResult, JudgeError> {
        let spec = self.validate(request)?;

        let workspace = self.workspaces.acquire().await?;
        let result = self.judge_in(&workspace, spec, request).await;
        workspace.release().await;

        let result = result?;
        tracing::info!(
            "Judgment finished: passed={}, passed_cases={}/{}, compile_error={}",
            result.passed,
            result.results.iter().filter(|r| r.passed).count(),
            result.results.len(),
            result.compile_error.is_some()
        );
        Ok(result)
    }

    fn validate(&self, request: &JudgeRequest) -> Result<&ToolchainSpec, ValidationError> {
        let spec = self
            .registry
            .lookup(&request.language)
            .map_err(|_| ValidationError::UnsupportedLanguage(request.language.clone()))?;
        if request.test_cases.is_empty() {
            return Err(ValidationError::NoTestCases);
        }
        if request.final_completion {
            if request.identity.contains(['\n', '\r']) {
                return Err(ValidationError::MultilineIdentity);
            }
            if request.identity.trim().is_empty() {
                return Err(ValidationError::MissingIdentity);
            }
        }
        Ok(spec)
    }

    async fn judge_in(
        &self,
        workspace: &Workspace,
        spec: &ToolchainSpec,
        request: &JudgeRequest,
    ) -> Result<JudgeResult, JudgeError> {
        let source = workspace.write_source(spec, &request.source_code).await?;
        let result = pipeline::evaluate(
            &self.runner,
            spec,
            &source,
            &request.test_cases,
            &self.limits,
        )
        .await?;

        if request.final_completion && result.passed {
            self.record_completion(&request.identity).await;
        }
        Ok(result)
    }

    /// Ledger failures are logged and never change the judgment.
    async fn record_completion(&self, identity: &str) {
        match self.ledger.record_if_first(identity).await {
            Ok(outcome) if outcome.written => {
                tracing::info!("First full completion recorded for {}", identity)
            }
            Ok(_) => tracing::debug!("Completion for {} was already recorded", identity),
            Err(e) => tracing::error!("Failed to record completion for {}: {}", identity, e),
        }
    }
}
