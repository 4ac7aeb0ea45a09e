use std::sync::Arc;

use crate::{
    constants::COMPILE_TIMEOUT_MSG,
    core::{
        domain::{ExecutionOutcome, Invocation},
        traits::runner::{ProcessRunner, RunError},
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompileOutcome {
    Compiled,
    Failed { msg: String },
}

/// Runs the compile step, if the toolchain has one.
///
/// Any stderr output counts as a failure, even with a zero exit status.
/// `Err` is reserved for a compiler that could not be launched.
#[tracing::instrument(skip_all)]
pub async fn compile(
    runner: &Arc<dyn ProcessRunner>,
    invocation: Option<Invocation>,
) -> Result<CompileOutcome, RunError> {
    let Some(invocation) = invocation else {
        return Ok(CompileOutcome::Compiled);
    };

    tracing::debug!("Start compiling: {:?}", invocation);
    let outcome = runner.run(&invocation).await?;
    tracing::debug!("Compilation result: {:?}", outcome);

    if outcome.timed_out {
        return Ok(CompileOutcome::Failed {
            msg: COMPILE_TIMEOUT_MSG.to_string(),
        });
    }
    if !outcome.success() || !outcome.stderr.trim().is_empty() {
        return Ok(CompileOutcome::Failed {
            msg: diagnostic(&outcome),
        });
    }
    Ok(CompileOutcome::Compiled)
}

fn diagnostic(outcome: &ExecutionOutcome) -> String {
    let text = outcome.observed_output();
    if text.is_empty() {
        format!("Compiler exited with code {:?}", outcome.exit_code)
    } else {
        text.to_string()
    }
}
