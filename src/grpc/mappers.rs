use itertools::Itertools;
use tonic::Status;

use crate::core::{domain, judge::JudgeError, traits::ledger::LedgerError};
use crate::grpc::models::{self, chrono_to_prost};

impl From<models::JudgeRequest> for domain::JudgeRequest {
    fn from(req: models::JudgeRequest) -> Self {
        Self {
            language: req.language,
            source_code: req.source_code,
            test_cases: req.test_cases.into_iter().map(Into::into).collect(),
            identity: req.identity,
            final_completion: req.final_completion,
        }
    }
}

impl From<models::TestCase> for domain::TestCase {
    fn from(test_case: models::TestCase) -> Self {
        Self {
            input: test_case.input,
            expected: test_case.expected,
        }
    }
}

impl From<&domain::CaseStatus> for models::CaseStatus {
    fn from(status: &domain::CaseStatus) -> Self {
        match status {
            domain::CaseStatus::Passed => models::CaseStatus::Passed,
            domain::CaseStatus::WrongAnswer => models::CaseStatus::WrongAnswer,
            domain::CaseStatus::RuntimeError { .. } => models::CaseStatus::RuntimeError,
            domain::CaseStatus::TimedOut => models::CaseStatus::TimedOut,
            domain::CaseStatus::LaunchFailed => models::CaseStatus::LaunchFailed,
            domain::CaseStatus::NotRun => models::CaseStatus::NotRun,
        }
    }
}

impl From<domain::TestCaseResult> for models::TestCaseResult {
    fn from(result: domain::TestCaseResult) -> Self {
        Self {
            status: models::CaseStatus::from(&result.status).into(),
            input: result.input,
            output: result.output,
            expected: result.expected,
            passed: result.passed,
            exit_code: result.exit_code,
            elapsed_ms: result.elapsed_ms,
        }
    }
}

impl From<domain::JudgeResult> for models::JudgeResponse {
    fn from(result: domain::JudgeResult) -> Self {
        let output = result.results.iter().map(|r| &r.output).join("\n");
        let expected = result.results.iter().map(|r| &r.expected).join("\n");

        Self {
            passed: result.passed,
            results: result.results.into_iter().map(Into::into).collect(),
            compile_error: result.compile_error,
            output,
            expected,
        }
    }
}

impl From<domain::LedgerEntry> for models::Completion {
    fn from(entry: domain::LedgerEntry) -> Self {
        Self {
            identity: entry.identity,
            completed_at: Some(chrono_to_prost(entry.completed_at)),
        }
    }
}

impl From<JudgeError> for Status {
    fn from(err: JudgeError) -> Self {
        match err {
            JudgeError::Validation(e) => Status::invalid_argument(e.to_string()),
            JudgeError::Workspace(e) => {
                tracing::error!("Workspace error: {}", e);
                Status::internal("Failed to prepare workspace")
            }
            JudgeError::Launch(e) => {
                tracing::error!("Toolchain error: {}", e);
                Status::internal(e.to_string())
            }
        }
    }
}

impl From<LedgerError> for Status {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Closed => Status::unavailable(err.to_string()),
            LedgerError::InvalidIdentity(_) => Status::invalid_argument(err.to_string()),
            LedgerError::Io { .. } | LedgerError::Task(_) => {
                tracing::error!("Ledger error: {}", err);
                Status::internal("Failed to access completion ledger")
            }
        }
    }
}
