use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, timeout};

use crate::constants::{PIPE_DRAIN_GRACE_MS, READ_CHUNK_BYTES};
use crate::core::domain::{ExecutionOutcome, Invocation};
use crate::core::traits::runner::{ProcessRunner, RunError};

/// Runs host executables directly, one process group per spawn.
#[derive(Clone, Debug)]
pub struct NativeProcessRunner {
    output_limit_bytes: usize,
}

impl NativeProcessRunner {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

#[async_trait::async_trait]
impl ProcessRunner for NativeProcessRunner {
    #[tracing::instrument(skip(self, invocation), fields(program = %invocation.program))]
    async fn run(&self, invocation: &Invocation) -> Result<ExecutionOutcome, RunError> {
        let stdin = match invocation.stdin {
            Some(_) => Stdio::piped(),
            None => Stdio::null(),
        };
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(stdin)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .process_group(0)
            .kill_on_drop(true);

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|source| RunError::Launch {
            program: invocation.program.clone(),
            source,
        })?;
        let mut group = ProcessGroup::new(child.id());

        let stdout = Capture::spawn(child.stdout.take(), self.output_limit_bytes);
        let stderr = Capture::spawn(child.stderr.take(), self.output_limit_bytes);
        let feeder = child
            .stdin
            .take()
            .zip(invocation.stdin.clone())
            .map(|(mut pipe, input)| {
                tokio::spawn(async move {
                    // The program may exit without reading its input.
                    if let Err(e) = pipe.write_all(input.as_bytes()).await {
                        tracing::debug!("stdin not fully consumed: {}", e);
                    }
                })
            });

        let status = match timeout(invocation.timeout, child.wait()).await {
            Ok(Ok(status)) => Some(status),
            Ok(Err(source)) => {
                group.kill();
                return Err(RunError::Wait {
                    program: invocation.program.clone(),
                    source,
                });
            }
            Err(_) => None,
        };
        let elapsed_ms = start.elapsed().as_millis() as u64;

        // On timeout this is the kill; after a normal exit it sweeps
        // background processes the program left behind.
        group.kill();
        if status.is_none() {
            tracing::debug!("Time limit of {:?} exceeded", invocation.timeout);
            if let Err(e) = child.kill().await {
                tracing::debug!("Failed to reap timed out process: {}", e);
            }
        }
        if let Some(feeder) = feeder {
            feeder.abort();
        }

        let outcome = ExecutionOutcome {
            stdout: stdout.finish().await,
            stderr: stderr.finish().await,
            exit_code: status.as_ref().and_then(exit_code),
            elapsed_ms,
            timed_out: status.is_none(),
        };
        tracing::debug!(
            "Process finished: exit_code={:?}, timed_out={}, elapsed_ms={}",
            outcome.exit_code,
            outcome.timed_out,
            outcome.elapsed_ms
        );
        Ok(outcome)
    }
}

/// Signal-terminated processes report the negated signal number.
fn exit_code(status: &ExitStatus) -> Option<i32> {
    status.code().or_else(|| status.signal().map(|signal| -signal))
}

/// Process group created by `process_group(0)`; its id equals the leader pid.
/// Killed at most once, and always killed on drop so a cancelled judgment
/// cannot leave descendants running.
#[derive(Debug)]
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

impl ProcessGroup {
    fn new(leader: Option<u32>) -> Self {
        Self {
            pgid: leader.and_then(|pid| libc::pid_t::try_from(pid).ok()),
        }
    }

    fn kill(&mut self) {
        let Some(pgid) = self.pgid.take() else {
            return;
        };
        // SAFETY: killpg has no memory-safety preconditions; pgid is a
        // positive id of a group this runner created.
        let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
        if rc != 0 {
            let err = std::io::Error::last_os_error();
            if err.raw_os_error() != Some(libc::ESRCH) {
                tracing::warn!("Failed to kill process group {}: {}", pgid, err);
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}

/// Incrementally collected pipe contents, capped at `limit` bytes.
/// Bytes past the cap are read and discarded so the writer never blocks.
struct Capture {
    buf: Arc<Mutex<Vec<u8>>>,
    reader: Option<JoinHandle<()>>,
}

impl Capture {
    fn spawn<R>(pipe: Option<R>, limit: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let buf = Arc::new(Mutex::new(Vec::new()));
        let reader = pipe.map(|mut pipe| {
            let buf = buf.clone();
            tokio::spawn(async move {
                let mut chunk = vec![0u8; READ_CHUNK_BYTES];
                loop {
                    match pipe.read(&mut chunk).await {
                        Ok(0) => break,
                        Ok(n) => append(&buf, &chunk[..n], limit),
                        Err(e) => {
                            tracing::debug!("Pipe read failed: {}", e);
                            break;
                        }
                    }
                }
            })
        });
        Self { buf, reader }
    }

    /// Waits briefly for EOF, then returns whatever was captured. A pipe held
    /// open by an escaped descendant does not block the caller.
    async fn finish(mut self) -> String {
        if let Some(reader) = self.reader.take() {
            let abort = reader.abort_handle();
            if timeout(Duration::from_millis(PIPE_DRAIN_GRACE_MS), reader)
                .await
                .is_err()
            {
                abort.abort();
            }
        }
        let bytes = std::mem::take(&mut *self.buf.lock().unwrap_or_else(PoisonError::into_inner));
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

fn append(buf: &Mutex<Vec<u8>>, data: &[u8], limit: usize) {
    let mut buf = buf.lock().unwrap_or_else(PoisonError::into_inner);
    let room = limit.saturating_sub(buf.len());
    buf.extend_from_slice(&data[..data.len().min(room)]);
}
