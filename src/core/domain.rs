use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Language {
    Cpp,
    Python,
    Java,
}

#[derive(Clone, Debug)]
pub struct JudgeRequest {
    pub language: String,
    pub source_code: String,
    pub test_cases: Vec<TestCase>,
    pub identity: String,
    pub final_completion: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCase {
    pub input: String,
    pub expected: String,
}

/// One fully specified process spawn: argv, working directory, optional
/// standard input and a wall-clock limit.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub stdin: Option<String>,
    pub timeout: Duration,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExecutionOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
    pub timed_out: bool,
}

impl ExecutionOutcome {
    pub fn success(&self) -> bool {
        !self.timed_out && self.exit_code == Some(0)
    }

    /// Trimmed stdout, or trimmed stderr when stdout has nothing to say.
    pub fn observed_output(&self) -> &str {
        let stdout = self.stdout.trim();
        if stdout.is_empty() {
            self.stderr.trim()
        } else {
            stdout
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum CaseStatus {
    Passed,
    WrongAnswer,
    RuntimeError { exit_code: Option<i32> },
    TimedOut,
    LaunchFailed,
    NotRun,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestCaseResult {
    pub input: String,
    pub output: String,
    pub expected: String,
    pub passed: bool,
    pub status: CaseStatus,
    pub exit_code: Option<i32>,
    pub elapsed_ms: u64,
}

impl TestCaseResult {
    pub fn not_run(test_case: &TestCase) -> Self {
        Self {
            input: test_case.input.clone(),
            output: String::new(),
            expected: test_case.expected.clone(),
            passed: false,
            status: CaseStatus::NotRun,
            exit_code: None,
            elapsed_ms: 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct JudgeResult {
    pub passed: bool,
    pub results: Vec<TestCaseResult>,
    pub compile_error: Option<String>,
}

impl JudgeResult {
    pub fn from_results(results: Vec<TestCaseResult>) -> Self {
        Self {
            passed: !results.is_empty() && results.iter().all(|r| r.passed),
            results,
            compile_error: None,
        }
    }

    /// Every case fails with the compiler diagnostic as its output.
    pub fn compile_failed(test_cases: &[TestCase], msg: String) -> Self {
        let results = test_cases
            .iter()
            .map(|test_case| TestCaseResult {
                output: msg.clone(),
                ..TestCaseResult::not_run(test_case)
            })
            .collect();
        Self {
            passed: false,
            results,
            compile_error: Some(msg),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerEntry {
    pub identity: String,
    pub completed_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RecordOutcome {
    pub written: bool,
}

#[derive(Clone, Debug)]
pub struct JudgeLimits {
    pub run_timeout: Duration,
    pub compile_timeout: Duration,
    pub max_parallel_tests: usize,
    pub require_zero_exit: bool,
}
