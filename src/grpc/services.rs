use tonic::{Request, Response, Status};

use crate::{
    core::{domain, judge::Judge},
    grpc::models::{
        Completion, Empty, JudgeRequest, JudgeResponse, ListCompletionsResponse,
        judge_service_server::JudgeService,
    },
};

#[derive(Clone, Debug)]
pub struct JudgeServiceImpl {
    judge: Judge,
}

#[tonic::async_trait]
impl JudgeService for JudgeServiceImpl {
    #[tracing::instrument(skip_all)]
    async fn judge(
        &self,
        request: Request<JudgeRequest>,
    ) -> Result<Response<JudgeResponse>, Status> {
        let request: domain::JudgeRequest = request.into_inner().into();
        tracing::info!(
            "Received judge request: language={}, cases={}, final={}",
            request.language,
            request.test_cases.len(),
            request.final_completion
        );

        let result = self.judge.judge(&request).await?;
        Ok(Response::new(result.into()))
    }

    #[tracing::instrument(skip_all)]
    async fn list_completions(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<ListCompletionsResponse>, Status> {
        let completions: Vec<Completion> = self
            .judge
            .ledger()
            .read_all()
            .await?
            .into_iter()
            .map(Into::into)
            .collect();
        tracing::debug!("Listing {} completions", completions.len());
        Ok(Response::new(ListCompletionsResponse { completions }))
    }

    #[tracing::instrument(skip_all)]
    async fn clear_completions(
        &self,
        _request: Request<Empty>,
    ) -> Result<Response<Empty>, Status> {
        self.judge.ledger().clear().await?;
        tracing::info!("Completion ledger cleared");
        Ok(Response::new(Empty {}))
    }
}

impl JudgeServiceImpl {
    pub fn new(judge: Judge) -> Self {
        Self { judge }
    }
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Arc;
    use std::time::Duration;

    use chrono::{TimeZone, Utc};
    use tonic::Code;

    use super::*;
    use crate::{
        core::{
            domain::{JudgeLimits, LedgerEntry, RecordOutcome},
            toolchain::ToolchainRegistry,
            traits::{
                ledger::{LedgerError, MockCompletionLedger},
                runner::ProcessRunner,
            },
            workspace::WorkspaceManager,
        },
        grpc::models::{CaseStatus, TestCase},
        stubs::runner::{RunnerStub, exited},
    };

    fn service(root: &Path, runner: Arc<dyn ProcessRunner>, ledger: MockCompletionLedger) -> JudgeServiceImpl {
        JudgeServiceImpl::new(Judge::new(
            Arc::new(ToolchainRegistry::default()),
            WorkspaceManager::new(root),
            runner,
            Arc::new(ledger),
            JudgeLimits {
                run_timeout: Duration::from_secs(2),
                compile_timeout: Duration::from_secs(10),
                max_parallel_tests: 2,
                require_zero_exit: true,
            },
        ))
    }

    fn two_sum_request(language: &str) -> JudgeRequest {
        JudgeRequest {
            language: language.to_string(),
            source_code: "int main() { return 0; }".to_string(),
            test_cases: vec![
                TestCase {
                    input: "4\n2 7 11 15\n9".to_string(),
                    expected: "0 1".to_string(),
                },
                TestCase {
                    input: "3\n3 2 4\n6".to_string(),
                    expected: "1 2".to_string(),
                },
            ],
            identity: "alice".to_string(),
            final_completion: true,
        }
    }

    /// Compiles anything and answers with the expected Two-Sum output.
    fn two_sum_runner() -> Arc<RunnerStub> {
        Arc::new(RunnerStub::new(|inv| {
            let out = match inv.stdin.as_deref() {
                None => "",
                Some(stdin) if stdin.ends_with("9") => "0 1\n",
                Some(_) => "1 2\n",
            };
            (Duration::ZERO, Ok(exited(0, out, "")))
        }))
    }

    #[tokio::test]
    async fn test_judge_success_records_completion() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = MockCompletionLedger::new();
        ledger
            .expect_record_if_first()
            .times(1)
            .returning(|_| Ok(RecordOutcome { written: true }));
        let service = service(tmp.path(), two_sum_runner(), ledger);

        let response = service
            .judge(Request::new(two_sum_request("54")))
            .await
            .unwrap()
            .into_inner();

        assert!(response.passed);
        assert_eq!(response.compile_error, None);
        assert_eq!(response.output, "0 1\n1 2");
        assert_eq!(response.expected, "0 1\n1 2");
        assert!(
            response
                .results
                .iter()
                .all(|r| r.status() == CaseStatus::Passed)
        );
    }

    #[tokio::test]
    async fn test_judge_unknown_language_is_invalid_argument() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = MockCompletionLedger::new();
        ledger.expect_record_if_first().never();
        let service = service(tmp.path(), two_sum_runner(), ledger);

        let status = service
            .judge(Request::new(two_sum_request("brainfuck")))
            .await
            .unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("brainfuck"));
    }

    #[tokio::test]
    async fn test_judge_compile_error_is_a_response() {
        let tmp = tempfile::tempdir().unwrap();
        let runner = Arc::new(RunnerStub::new(|_| {
            (
                Duration::ZERO,
                Ok(exited(1, "", "main.cpp:1:14: error: expected ';'")),
            )
        }));
        let mut ledger = MockCompletionLedger::new();
        ledger.expect_record_if_first().never();
        let service = service(tmp.path(), runner, ledger);

        let response = service
            .judge(Request::new(two_sum_request("cpp")))
            .await
            .unwrap()
            .into_inner();

        assert!(!response.passed);
        assert_eq!(
            response.compile_error.as_deref(),
            Some("main.cpp:1:14: error: expected ';'")
        );
        assert!(
            response
                .results
                .iter()
                .all(|r| r.status() == CaseStatus::NotRun)
        );
    }

    #[tokio::test]
    async fn test_list_completions() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = MockCompletionLedger::new();
        ledger.expect_read_all().times(1).returning(|| {
            Ok(vec![
                LedgerEntry {
                    identity: "bob".to_string(),
                    completed_at: Utc.with_ymd_and_hms(2024, 5, 2, 8, 0, 0).unwrap(),
                },
                LedgerEntry {
                    identity: "alice".to_string(),
                    completed_at: Utc.with_ymd_and_hms(2024, 5, 1, 8, 0, 0).unwrap(),
                },
            ])
        });
        let service = service(tmp.path(), two_sum_runner(), ledger);

        let response = service
            .list_completions(Request::new(Empty {}))
            .await
            .unwrap()
            .into_inner();

        let identities: Vec<_> = response
            .completions
            .iter()
            .map(|c| c.identity.as_str())
            .collect();
        assert_eq!(identities, vec!["bob", "alice"]);
        assert!(response.completions.iter().all(|c| c.completed_at.is_some()));
    }

    #[tokio::test]
    async fn test_clear_completions() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = MockCompletionLedger::new();
        ledger.expect_clear().times(1).returning(|| Ok(()));
        let service = service(tmp.path(), two_sum_runner(), ledger);

        service
            .clear_completions(Request::new(Empty {}))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_closed_ledger_is_unavailable() {
        let tmp = tempfile::tempdir().unwrap();
        let mut ledger = MockCompletionLedger::new();
        ledger
            .expect_read_all()
            .returning(|| Err(LedgerError::Closed));
        ledger.expect_clear().returning(|| Err(LedgerError::Closed));
        let service = service(tmp.path(), two_sum_runner(), ledger);

        let listed = service
            .list_completions(Request::new(Empty {}))
            .await
            .unwrap_err();
        let cleared = service
            .clear_completions(Request::new(Empty {}))
            .await
            .unwrap_err();

        assert_eq!(listed.code(), Code::Unavailable);
        assert_eq!(cleared.code(), Code::Unavailable);
    }
}
