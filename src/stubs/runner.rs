use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::core::{
    domain::{ExecutionOutcome, Invocation},
    traits::runner::{ProcessRunner, RunError},
};

type Script =
    dyn Fn(&Invocation) -> (Duration, Result<ExecutionOutcome, RunError>) + Send + Sync;

/// Scripted process runner: the closure decides how long each invocation
/// "runs" and what it returns. Records every call and the peak number of
/// overlapping runs.
pub struct RunnerStub {
    script: Box<Script>,
    calls: Mutex<Vec<Invocation>>,
    in_flight: AtomicUsize,
    pub peak_in_flight: AtomicUsize,
}

impl RunnerStub {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&Invocation) -> (Duration, Result<ExecutionOutcome, RunError>)
            + Send
            + Sync
            + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }
}

impl std::fmt::Debug for RunnerStub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerStub")
            .field("calls", &self.calls.lock().unwrap().len())
            .finish()
    }
}

#[async_trait::async_trait]
impl ProcessRunner for RunnerStub {
    #[tracing::instrument]
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutcome, RunError> {
        self.calls.lock().unwrap().push(invocation.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);

        let (delay, result) = (self.script)(invocation);
        tracing::debug!("Execution result after {:?}: {:?}", delay, result);
        tokio::time::sleep(delay).await;

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

pub fn exited(code: i32, stdout: &str, stderr: &str) -> ExecutionOutcome {
    ExecutionOutcome {
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        exit_code: Some(code),
        elapsed_ms: 5,
        timed_out: false,
    }
}
