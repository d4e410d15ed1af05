//! JSON-file queue store.
//!
//! The whole table is read on every call and rewritten on every change. Every
//! call holds an advisory lock on `<file>.lock` for its full read or
//! read-modify-write cycle, so stores in separate processes sharing one file
//! never lose each other's writes. A rewrite goes to a uniquely named sibling
//! temp file that is renamed over the queue file, so a crash never leaves a
//! half-written queue behind.

use std::fs::{self, File, OpenOptions};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use fd_lock::RwLock;
use tempfile::NamedTempFile;
use tracing::{Span, debug, info};

use super::entries::{EntryTable, QueueEntry};
use crate::domain::{QueueError, Receipt, RequestId, TransferRequest};
use crate::ports::QueueStore;

#[derive(Debug, Clone)]
pub struct FileQueueStore {
    path: PathBuf,
}

impl FileQueueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn entries(&self) -> Result<Vec<QueueEntry>, QueueError> {
        self.read(|table| table.entries().to_vec()).await
    }

    async fn read<T: Send + 'static>(
        &self,
        view: impl FnOnce(&EntryTable) -> T + Send + 'static,
    ) -> Result<T, QueueError> {
        let path = self.path.clone();
        blocking(move || {
            let lock = open_lock(&path)?;
            let _shared = lock.read()?;
            Ok(view(&load(&path)?))
        })
        .await
    }

    async fn update<T: Send + 'static>(
        &self,
        change: impl FnOnce(&mut EntryTable) -> Result<T, QueueError> + Send + 'static,
    ) -> Result<T, QueueError> {
        let path = self.path.clone();
        blocking(move || {
            let mut lock = open_lock(&path)?;
            let _exclusive = lock.write()?;
            let mut table = load(&path)?;
            let value = change(&mut table)?;
            save(&path, &table)?;
            Ok(value)
        })
        .await
    }
}

/// Runs file work off the async workers, inside the caller's span.
async fn blocking<T: Send + 'static>(
    job: impl FnOnce() -> Result<T, QueueError> + Send + 'static,
) -> Result<T, QueueError> {
    let span = Span::current();
    tokio::task::spawn_blocking(move || span.in_scope(job))
        .await
        .map_err(|err| QueueError::Unavailable(format!("queue file task failed: {err}")))?
}

fn parent_dir(path: &Path) -> &Path {
    path.parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."))
}

/// Opens `<file>.lock`, creating it and the queue directory when absent.
fn open_lock(path: &Path) -> Result<RwLock<File>, QueueError> {
    fs::create_dir_all(parent_dir(path))?;
    let mut lock_path = path.as_os_str().to_owned();
    lock_path.push(".lock");
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(PathBuf::from(lock_path))?;
    Ok(RwLock::new(file))
}

/// A missing file is an empty queue.
fn load(path: &Path) -> Result<EntryTable, QueueError> {
    match fs::read(path) {
        Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => Ok(EntryTable::default()),
        Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(EntryTable::default()),
        Err(err) => Err(err.into()),
    }
}

fn save(path: &Path, table: &EntryTable) -> Result<(), QueueError> {
    let mut tmp = NamedTempFile::new_in(parent_dir(path))?;
    serde_json::to_writer_pretty(tmp.as_file_mut(), table)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|err| err.error)?;
    debug!(path = %path.display(), entries = table.entries().len(), "queue file written");
    Ok(())
}

#[async_trait]
impl QueueStore for FileQueueStore {
    /// Creates the queue file when absent and verifies it parses.
    async fn check(&self) -> Result<(), QueueError> {
        let path = self.path.clone();
        blocking(move || {
            let mut lock = open_lock(&path)?;
            let _exclusive = lock.write()?;
            if path.try_exists()? {
                load(&path)?;
            } else {
                save(&path, &EntryTable::default())?;
                info!(path = %path.display(), "created queue file");
            }
            Ok(())
        })
        .await
    }

    async fn list_pending(&self) -> Result<Vec<TransferRequest>, QueueError> {
        self.read(EntryTable::pending).await
    }

    async fn append(&self, amount: &str, recipient: &str) -> Result<RequestId, QueueError> {
        let (amount, recipient) = (amount.to_string(), recipient.to_string());
        self.update(move |table| Ok(table.append(&amount, &recipient))).await
    }

    async fn mark_completed(&self, id: RequestId) -> Result<(), QueueError> {
        self.update(move |table| table.mark_completed(id)).await
    }

    async fn record_primary(&self, id: RequestId, receipt: &Receipt) -> Result<(), QueueError> {
        let receipt = receipt.clone();
        self.update(move |table| table.record_primary(id, &receipt)).await
    }

    async fn record_failure(&self, id: RequestId, error: &str) -> Result<u32, QueueError> {
        let error = error.to_string();
        self.update(move |table| table.record_failure(id, &error)).await
    }

    async fn mark_dead(&self, id: RequestId, reason: &str) -> Result<(), QueueError> {
        let reason = reason.to_string();
        self.update(move |table| table.mark_dead(id, &reason)).await
    }

    async fn dead_count(&self) -> Result<usize, QueueError> {
        self.read(EntryTable::dead_count).await
    }
}
