use std::sync::Arc;

use futures::stream::{self, StreamExt};

use crate::core::{
    domain::{CaseStatus, ExecutionOutcome, JudgeLimits, TestCase, TestCaseResult},
    toolchain::{PreparedSource, ToolchainSpec},
    traits::runner::{ProcessRunner, RunError},
};

/// Runs every test case, at most `max_parallel_tests` at a time, and returns
/// the results in test case order regardless of completion order.
#[tracing::instrument(skip_all, fields(cases = test_cases.len()))]
pub async fn run_test_cases(
    runner: &Arc<dyn ProcessRunner>,
    spec: &ToolchainSpec,
    source: &PreparedSource,
    test_cases: &[TestCase],
    limits: &JudgeLimits,
) -> Vec<TestCaseResult> {
    let workers = limits.max_parallel_tests.clamp(1, test_cases.len().max(1));
    let mut slots: Vec<Option<TestCaseResult>> = vec![None; test_cases.len()];

    // Stream items are owned so the resulting future stays Send.
    let invocations = test_cases
        .iter()
        .map(|test_case| spec.run_invocation(source, &test_case.input, limits.run_timeout))
        .enumerate()
        .collect::<Vec<_>>();
    let runner = runner.clone();
    let mut finished = stream::iter(invocations)
        .map(move |(test_idx, invocation)| {
            let runner = runner.clone();
            async move { (test_idx, runner.run(&invocation).await) }
        })
        .buffer_unordered(workers);

    while let Some((test_idx, result)) = finished.next().await {
        let graded = grade(&test_cases[test_idx], result, limits.require_zero_exit);
        tracing::debug!("Test {} finished: {:?}", test_idx, graded.status);
        slots[test_idx] = Some(graded);
    }

    slots
        .into_iter()
        .zip(test_cases)
        .map(|(slot, test_case)| slot.unwrap_or_else(|| TestCaseResult::not_run(test_case)))
        .collect()
}

/// Compares trimmed output (stdout, else stderr) against the expected value
/// exactly as stored.
pub fn grade(
    test_case: &TestCase,
    result: Result<ExecutionOutcome, RunError>,
    require_zero_exit: bool,
) -> TestCaseResult {
    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::warn!("Failed to run test case: {}", err);
            return TestCaseResult {
                input: test_case.input.clone(),
                output: err.to_string(),
                expected: test_case.expected.clone(),
                passed: false,
                status: CaseStatus::LaunchFailed,
                exit_code: None,
                elapsed_ms: 0,
            };
        }
    };

    let output = outcome.observed_output().to_string();
    let matches = output == test_case.expected;
    let status = if outcome.timed_out {
        CaseStatus::TimedOut
    } else if outcome.exit_code != Some(0) && (require_zero_exit || !matches) {
        CaseStatus::RuntimeError {
            exit_code: outcome.exit_code,
        }
    } else if matches {
        CaseStatus::Passed
    } else {
        CaseStatus::WrongAnswer
    };

    TestCaseResult {
        input: test_case.input.clone(),
        output,
        expected: test_case.expected.clone(),
        passed: status == CaseStatus::Passed,
        status,
        exit_code: outcome.exit_code,
        elapsed_ms: outcome.elapsed_ms,
    }
}
