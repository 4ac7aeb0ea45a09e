use std::sync::Arc;

use crate::core::{
    domain::{JudgeLimits, JudgeResult, TestCase},
    pipeline::compiling::CompileOutcome,
    toolchain::{PreparedSource, ToolchainSpec},
    traits::runner::{ProcessRunner, RunError},
};

pub mod compiling;
pub mod running;

/// Compile once, then run every test case. A failed compile is reported as
/// data: every case is marked not run and nothing else is spawned.
#[tracing::instrument(skip_all, fields(language = ?spec.language))]
pub async fn evaluate(
    runner: &Arc<dyn ProcessRunner>,
    spec: &ToolchainSpec,
    source: &PreparedSource,
    test_cases: &[TestCase],
    limits: &JudgeLimits,
) -> Result<JudgeResult, RunError> {
    let invocation = spec.compile_invocation(source, limits.compile_timeout);
    if let CompileOutcome::Failed { msg } = compiling::compile(runner, invocation).await? {
        tracing::info!("Compilation failed");
        return Ok(JudgeResult::compile_failed(test_cases, msg));
    }

    let results = running::run_test_cases(runner, spec, source, test_cases, limits).await;
    Ok(JudgeResult::from_results(results))
}
