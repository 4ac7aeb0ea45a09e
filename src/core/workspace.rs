use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use uuid::Uuid;

use crate::constants::WORKSPACE_PREFIX;
use crate::core::toolchain::{PreparedSource, ToolchainSpec};

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("failed to create workspace under {root}: {source}")]
    Create {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write source file {path}: {source}")]
    WriteSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Hands out private scratch directories under one root.
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    pub fn new<T: AsRef<Path>>(root: T) -> Self {
        Self {
            root: root.as_ref().into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Creates `<root>/judge_<random>`, creating the root first if needed.
    /// `create_dir` (not `create_dir_all`) makes a name collision an error
    /// instead of a silently shared directory.
    pub async fn acquire(&self) -> Result<Workspace, WorkspaceError> {
        let map_err = |source| WorkspaceError::Create {
            root: self.root.clone(),
            source,
        };

        fs::create_dir_all(&self.root).await.map_err(map_err)?;
        let dir = self
            .root
            .join(format!("{}{}", WORKSPACE_PREFIX, Uuid::new_v4().simple()));
        fs::create_dir(&dir).await.map_err(map_err)?;

        tracing::debug!("Acquired workspace {}", dir.display());
        Ok(Workspace {
            dir,
            released: false,
        })
    }
}

/// Exclusively owned scratch directory for one judgment.
///
/// [`Workspace::release`] is the normal way out. If the value is dropped
/// without it (panic, cancelled future) the directory is removed in `Drop`.
#[derive(Debug)]
pub struct Workspace {
    dir: PathBuf,
    released: bool,
}

impl Workspace {
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub async fn write_source(
        &self,
        spec: &ToolchainSpec,
        code: &str,
    ) -> Result<PreparedSource, WorkspaceError> {
        let entry = spec.entry_name(code);
        let source_path = self.dir.join(spec.source_file_name(code));

        fs::write(&source_path, code)
            .await
            .map_err(|source| WorkspaceError::WriteSource {
                path: source_path.clone(),
                source,
            })?;

        Ok(PreparedSource {
            workdir: self.dir.clone(),
            source_path,
            entry,
        })
    }

    /// Removes the directory tree. Never fails; errors are logged.
    pub async fn release(mut self) {
        self.released = true;
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => tracing::debug!("Released workspace {}", self.dir.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                "Failed to remove workspace {}: {}",
                self.dir.display(),
                e
            ),
        }
    }
}

/// Inside a runtime the removal goes to the blocking pool, so a cancelled
/// judgment does not stall a worker thread.
impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        let dir = std::mem::take(&mut self.dir);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn_blocking(move || remove_abandoned(&dir));
            }
            Err(_) => remove_abandoned(&dir),
        }
    }
}

fn remove_abandoned(dir: &Path) {
    match std::fs::remove_dir_all(dir) {
        Ok(()) => tracing::debug!("Removed abandoned workspace {}", dir.display()),
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(
            "Failed to remove abandoned workspace {}: {}",
            dir.display(),
            e
        ),
    }
}
