use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::constants::LEDGER_TMP_SUFFIX;
use crate::core::domain::{LedgerEntry, RecordOutcome};
use crate::core::traits::ledger::{CompletionLedger, LedgerError};

/// Completion ledger stored as `identity,timestamp` lines, newest first.
///
/// All access goes through one async mutex, so a read-check-append-persist
/// sequence is never interleaved with another. Writes replace the file via
/// rename; readers see either the old or the new content. The mutex only
/// covers this process: one ledger file must have one owning process.
///
/// Writes run on their own task. Dropping the caller's future does not stop
/// a write halfway.
#[derive(Debug, Clone)]
pub struct FileLedger {
    inner: Arc<LedgerFile>,
}

#[derive(Debug)]
struct LedgerFile {
    path: PathBuf,
    state: Mutex<LedgerState>,
}

#[derive(Debug, Default)]
struct LedgerState {
    closed: bool,
}

impl FileLedger {
    pub async fn open<T: AsRef<Path>>(path: T) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|source| io_error(parent, source))?;
        }
        sweep_temp_files(&path).await?;

        let existing = parse(&read_raw(&path).await?).len();
        tracing::info!(
            "Opened completion ledger {} with {} entries",
            path.display(),
            existing
        );

        Ok(Self {
            inner: Arc::new(LedgerFile {
                path,
                state: Mutex::new(LedgerState::default()),
            }),
        })
    }

    /// Waits for in-flight operations; every later call fails with
    /// [`LedgerError::Closed`].
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        state.closed = true;
        tracing::info!("Closed completion ledger {}", self.inner.path.display());
    }
}

#[async_trait::async_trait]
impl CompletionLedger for FileLedger {
    #[tracing::instrument(skip(self))]
    async fn record_if_first(&self, identity: &str) -> Result<RecordOutcome, LedgerError> {
        if identity.is_empty() || identity.contains(['\n', '\r']) {
            return Err(LedgerError::InvalidIdentity(identity.to_string()));
        }

        let inner = self.inner.clone();
        let identity = identity.to_string();
        tokio::spawn(async move { inner.record_if_first(&identity).await }).await?
    }

    async fn read_all(&self) -> Result<Vec<LedgerEntry>, LedgerError> {
        let state = self.inner.state.lock().await;
        if state.closed {
            return Err(LedgerError::Closed);
        }
        Ok(parse(&read_raw(&self.inner.path).await?))
    }

    #[tracing::instrument(skip(self))]
    async fn clear(&self) -> Result<(), LedgerError> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.clear().await }).await?
    }
}

impl LedgerFile {
    async fn record_if_first(&self, identity: &str) -> Result<RecordOutcome, LedgerError> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(LedgerError::Closed);
        }

        let current = read_raw(&self.path).await?;
        if contains_identity(&current, identity) {
            tracing::info!("Completion for {} already recorded, skipping", identity);
            return Ok(RecordOutcome { written: false });
        }

        let entry = LedgerEntry {
            identity: identity.to_string(),
            completed_at: Utc::now(),
        };
        let content = format!("{}{}", format_entry(&entry), current);
        write_atomic(&self.path, &content).await?;

        tracing::info!(
            "Recorded completion for {} at {}",
            identity,
            entry.completed_at
        );
        Ok(RecordOutcome { written: true })
    }

    async fn clear(&self) -> Result<(), LedgerError> {
        let state = self.state.lock().await;
        if state.closed {
            return Err(LedgerError::Closed);
        }
        write_atomic(&self.path, "").await?;
        tracing::info!("Cleared completion ledger {}", self.path.display());
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> LedgerError {
    LedgerError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn format_entry(entry: &LedgerEntry) -> String {
    format!(
        "{},{}\n",
        entry.identity,
        entry.completed_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// A missing file is an empty ledger.
async fn read_raw(path: &Path) -> Result<String, LedgerError> {
    match fs::read_to_string(path).await {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(io_error(path, e)),
    }
}

fn line_identity(line: &str) -> &str {
    line.rsplit_once(',').map_or(line, |(identity, _)| identity)
}

/// Also matches lines whose timestamp does not parse.
fn contains_identity(content: &str, identity: &str) -> bool {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .any(|line| line_identity(line) == identity)
}

/// Splits at the last comma so identities may contain commas.
fn parse(content: &str) -> Vec<LedgerEntry> {
    content
        .lines()
        .filter(|line| !line.trim().is_empty())
        .filter_map(|line| {
            let parsed = line.rsplit_once(',').and_then(|(identity, ts)| {
                DateTime::parse_from_rfc3339(ts.trim())
                    .ok()
                    .map(|ts| LedgerEntry {
                        identity: identity.to_string(),
                        completed_at: ts.with_timezone(&Utc),
                    })
            });
            if parsed.is_none() {
                tracing::warn!("Skipping malformed ledger line: {:?}", line);
            }
            parsed
        })
        .collect()
}

fn temp_name_parts(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
        .to_path_buf();
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    (dir, format!(".{}.", file_name))
}

/// Removes `.<name>.<id>.tmp` files left by a process that died mid-write.
async fn sweep_temp_files(path: &Path) -> Result<(), LedgerError> {
    let (dir, prefix) = temp_name_parts(path);
    let suffix = format!(".{}", LEDGER_TMP_SUFFIX);

    let mut entries = fs::read_dir(&dir)
        .await
        .map_err(|source| io_error(&dir, source))?;
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|source| io_error(&dir, source))?
    {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with(&prefix) || !name.ends_with(&suffix) {
            continue;
        }
        match fs::remove_file(entry.path()).await {
            Ok(()) => tracing::info!("Removed stale ledger temp file {}", name),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove stale temp file {}: {}", name, e),
        }
    }
    Ok(())
}

/// Temp file that is deleted on drop unless it was renamed into place.
struct TempFile {
    path: PathBuf,
    persisted: bool,
}

impl Drop for TempFile {
    fn drop(&mut self) {
        if self.persisted {
            return;
        }
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != ErrorKind::NotFound {
                tracing::warn!("Failed to remove {}: {}", self.path.display(), e);
            }
        }
    }
}

async fn write_atomic(path: &Path, content: &str) -> Result<(), LedgerError> {
    let (dir, prefix) = temp_name_parts(path);
    let mut tmp = TempFile {
        path: dir.join(format!(
            "{}{}.{}",
            prefix,
            Uuid::new_v4().simple(),
            LEDGER_TMP_SUFFIX
        )),
        persisted: false,
    };

    let result: std::io::Result<()> = async {
        let mut file = fs::File::create(&tmp.path).await?;
        file.write_all(content.as_bytes()).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&tmp.path, path).await
    }
    .await;

    result.map_err(|e| io_error(path, e))?;
    tmp.persisted = true;
    Ok(())
}
