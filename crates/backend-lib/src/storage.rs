// ============================
// chatware-backend-lib/src/storage.rs
// ============================
//! Audit-trail storage abstraction with flat-file implementation.
//!
//! The store is a downstream, eventually-consistent sink: the in-memory call
//! registry is authoritative and every write here is best-effort.
use crate::error::AppError;
use async_trait::async_trait;
use chatware_common::CallRecord;
use std::{
    fs,
    path::{Path, PathBuf},
};
use tokio::fs as tokio_fs;
use tracing::warn;

/// Trait for audit-trail backends
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist the `created` record for a new call
    async fn record_call(&self, record: &CallRecord) -> Result<(), AppError>;

    /// Persist the terminal `ended` record for a call
    async fn finalize_call(&self, record: &CallRecord) -> Result<(), AppError>;

    /// Page through a user's call records, newest first.
    /// Returns the page and the total number of matching records.
    async fn call_history(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<CallRecord>, usize), AppError>;
}

/// Flat-file implementation of the Storage trait.
///
/// One JSON file per call: `active-calls/{call_id}.json` while the call is
/// live, moved to `finished-calls/{call_id}.json` on termination.
#[derive(Clone)]
pub struct FlatFileStorage {
    root: PathBuf,
}

impl FlatFileStorage {
    pub fn new<P: AsRef<Path>>(root: P) -> anyhow::Result<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join("active-calls"))?;
        fs::create_dir_all(root.join("finished-calls"))?;
        Ok(Self { root })
    }

    fn active_path(&self, call_id: &str) -> PathBuf {
        self.root.join("active-calls").join(format!("{call_id}.json"))
    }

    fn finished_path(&self, call_id: &str) -> PathBuf {
        self.root
            .join("finished-calls")
            .join(format!("{call_id}.json"))
    }

    async fn read_dir_records(&self, dir: &Path, out: &mut Vec<CallRecord>) -> Result<(), AppError> {
        let mut entries = tokio_fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_none_or(|ext| ext != "json") {
                continue;
            }
            let content = tokio_fs::read_to_string(&path).await?;
            match serde_json::from_str::<CallRecord>(&content) {
                Ok(record) => out.push(record),
                // a corrupt file must not poison the whole listing
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable call record"),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Storage for FlatFileStorage {
    async fn record_call(&self, record: &CallRecord) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(record)?;
        tokio_fs::write(self.active_path(&record.call_id), json).await?;
        Ok(())
    }

    async fn finalize_call(&self, record: &CallRecord) -> Result<(), AppError> {
        let json = serde_json::to_string_pretty(record)?;
        tokio_fs::write(self.finished_path(&record.call_id), json).await?;

        // the creation write may never have landed; a missing active file is fine
        match tokio_fs::remove_file(self.active_path(&record.call_id)).await {
            Ok(()) => {},
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {},
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn call_history(
        &self,
        user_id: &str,
        limit: usize,
        offset: usize,
    ) -> Result<(Vec<CallRecord>, usize), AppError> {
        let mut records = Vec::new();
        self.read_dir_records(&self.root.join("active-calls"), &mut records)
            .await?;
        self.read_dir_records(&self.root.join("finished-calls"), &mut records)
            .await?;

        records.retain(|r| r.participants.iter().any(|p| p == user_id));
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));

        let total = records.len();
        let page = records.into_iter().skip(offset).take(limit).collect();
        Ok((page, total))
    }
}
