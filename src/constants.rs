pub const BINARY_NAME: &str = "main";
pub const DEFAULT_SOURCE_STEM: &str = "main";
pub const DEFAULT_JAVA_CLASS: &str = "Main";

pub const WORKSPACE_PREFIX: &str = "judge_";
pub const LEDGER_TMP_SUFFIX: &str = "tmp";

/// How long to keep draining pipes after the process group is gone.
pub const PIPE_DRAIN_GRACE_MS: u64 = 200;
pub const READ_CHUNK_BYTES: usize = 8 * 1024;

pub const DEFAULT_ADDR: &str = "[::1]:50051";
pub const DEFAULT_LEDGER_PATH: &str = "submissions.txt";
pub const DEFAULT_RUN_TIMEOUT_MS: u64 = 2_000;
pub const DEFAULT_COMPILE_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_MAX_PARALLEL_TESTS: usize = 4;
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1024 * 1024;

pub const COMPILE_TIMEOUT_MSG: &str = "Compilation timed out";
