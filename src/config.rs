use std::path::PathBuf;
use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

use crate::constants::{
    DEFAULT_ADDR, DEFAULT_COMPILE_TIMEOUT_MS, DEFAULT_LEDGER_PATH, DEFAULT_MAX_PARALLEL_TESTS,
    DEFAULT_OUTPUT_LIMIT_BYTES, DEFAULT_RUN_TIMEOUT_MS,
};
use crate::core::domain::JudgeLimits;
use crate::core::toolchain::ToolchainPaths;

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    /// gRPC listen address. Default: "[::1]:50051".
    pub addr: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkspaceConfig {
    /// Parent of the per-request scratch directories.
    pub root: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LedgerConfig {
    /// Completion ledger file. Default: "submissions.txt".
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LimitsConfig {
    pub run_timeout_ms: u64,
    pub compile_timeout_ms: u64,
    pub max_parallel_tests: usize,
    pub output_limit_bytes: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EvaluationConfig {
    /// A case passes only if the program also exited with status 0.
    pub require_zero_exit: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub workspace: WorkspaceConfig,
    pub ledger: LedgerConfig,
    pub limits: LimitsConfig,
    pub toolchain: ToolchainPaths,
    pub evaluation: EvaluationConfig,
}

impl AppConfig {
    /// Defaults, then the optional file named by `CODEJUDGE_CONFIG`
    /// (default `config/codejudge`), then `CODEJUDGE__SECTION__KEY`
    /// environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CODEJUDGE_CONFIG").unwrap_or_else(|_| "config/codejudge".to_string());
        Self::builder()?
            .add_source(File::with_name(&config_path).required(false))
            .add_source(Environment::with_prefix("CODEJUDGE").separator("__"))
            .build()?
            .try_deserialize()
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let toolchain = ToolchainPaths::default();
        let workspace_root = std::env::temp_dir().join("codejudge");

        Config::builder()
            .set_default("server.addr", DEFAULT_ADDR)?
            .set_default("workspace.root", workspace_root.to_string_lossy().into_owned())?
            .set_default("ledger.path", DEFAULT_LEDGER_PATH)?
            .set_default("limits.run_timeout_ms", DEFAULT_RUN_TIMEOUT_MS as i64)?
            .set_default("limits.compile_timeout_ms", DEFAULT_COMPILE_TIMEOUT_MS as i64)?
            .set_default("limits.max_parallel_tests", DEFAULT_MAX_PARALLEL_TESTS as i64)?
            .set_default("limits.output_limit_bytes", DEFAULT_OUTPUT_LIMIT_BYTES as i64)?
            .set_default("toolchain.gxx", toolchain.gxx)?
            .set_default("toolchain.python", toolchain.python)?
            .set_default("toolchain.javac", toolchain.javac)?
            .set_default("toolchain.java", toolchain.java)?
            .set_default("evaluation.require_zero_exit", true)
    }

    pub fn judge_limits(&self) -> JudgeLimits {
        JudgeLimits {
            run_timeout: Duration::from_millis(self.limits.run_timeout_ms),
            compile_timeout: Duration::from_millis(self.limits.compile_timeout_ms),
            max_parallel_tests: self.limits.max_parallel_tests.max(1),
            require_zero_exit: self.evaluation.require_zero_exit,
        }
    }
}
