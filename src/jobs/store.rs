//! Job parameter handoff between submission and execution.
//!
//! Each job owns exactly one entry, written once at submission and deleted
//! when its run ends. Deleting an absent entry is not an error.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;

use crate::config::{StoreBackend, StoreConfig};
use crate::jobs::types::JobParameters;

/// Errors raised by a job store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("stored job is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Key-value blob store keyed by job id.
pub trait JobStore: Send + Sync {
    fn put(&self, job_id: &str, blob: Vec<u8>) -> Result<(), StoreError>;

    fn get(&self, job_id: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Remove an entry; a missing entry is a no-op.
    fn delete(&self, job_id: &str) -> Result<(), StoreError>;

    fn put_parameters(&self, job_id: &str, params: &JobParameters) -> Result<(), StoreError> {
        self.put(job_id, serde_json::to_vec(params)?)
    }

    fn get_parameters(&self, job_id: &str) -> Result<Option<JobParameters>, StoreError> {
        match self.get(job_id)? {
            Some(blob) => Ok(Some(serde_json::from_slice(&blob)?)),
            None => Ok(None),
        }
    }

    /// Ids of every stored entry.
    fn job_ids(&self) -> Result<Vec<String>, StoreError>;

    /// Delete entries submitted before `cutoff` (unix seconds), and entries
    /// that no longer decode. Returns how many were removed.
    fn purge_created_before(&self, cutoff: u64) -> Result<usize, StoreError> {
        let mut purged = 0;
        for job_id in self.job_ids()? {
            let stale = match self.get_parameters(&job_id) {
                Ok(Some(params)) => params.created_at < cutoff,
                Ok(None) => false,
                Err(StoreError::Corrupt(_)) => true,
                Err(e) => return Err(e),
            };
            if stale {
                self.delete(&job_id)?;
                purged += 1;
            }
        }
        Ok(purged)
    }
}

/// Build the store selected by configuration.
pub fn from_config(config: &StoreConfig) -> Result<Arc<dyn JobStore>, StoreError> {
    match config.backend {
        StoreBackend::Memory => Ok(Arc::new(MemoryJobStore::new())),
        StoreBackend::File => Ok(Arc::new(FileJobStore::new(&config.dir)?)),
    }
}

/// In-process store.
#[derive(Clone, Default)]
pub struct MemoryJobStore {
    inner: Arc<DashMap<String, Vec<u8>>>,
}

impl MemoryJobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl JobStore for MemoryJobStore {
    fn put(&self, job_id: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        self.inner.insert(job_id.to_string(), blob);
        Ok(())
    }

    fn get(&self, job_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.inner.get(job_id).map(|r| r.value().clone()))
    }

    fn delete(&self, job_id: &str) -> Result<(), StoreError> {
        self.inner.remove(job_id);
        Ok(())
    }

    fn job_ids(&self) -> Result<Vec<String>, StoreError> {
        Ok(self.inner.iter().map(|r| r.key().clone()).collect())
    }
}

/// One JSON file per job in a directory.
#[derive(Debug, Clone)]
pub struct FileJobStore {
    dir: PathBuf,
}

const FILE_PREFIX: &str = "esa_job_";
const FILE_SUFFIX: &str = ".json";

impl FileJobStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn new(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, job_id: &str) -> PathBuf {
        let safe: String = job_id
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
            .collect();
        self.dir.join(format!("{}{}{}", FILE_PREFIX, safe, FILE_SUFFIX))
    }
}

impl JobStore for FileJobStore {
    fn put(&self, job_id: &str, blob: Vec<u8>) -> Result<(), StoreError> {
        fs::write(self.path_for(job_id), blob)?;
        Ok(())
    }

    fn get(&self, job_id: &str) -> Result<Option<Vec<u8>>, StoreError> {
        match fs::read(self.path_for(job_id)) {
            Ok(blob) => Ok(Some(blob)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn delete(&self, job_id: &str) -> Result<(), StoreError> {
        match fs::remove_file(self.path_for(job_id)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn job_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let name = entry?.file_name();
            let id = name
                .to_str()
                .and_then(|n| n.strip_prefix(FILE_PREFIX))
                .and_then(|n| n.strip_suffix(FILE_SUFFIX));
            if let Some(id) = id {
                ids.push(id.to_string());
            }
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::types::JobSubmission;

    fn params() -> JobParameters {
        JobSubmission {
            ak: "ak".into(),
            sk: "sk".into(),
            instance_id: "esa-1".into(),
            ..JobSubmission::default()
        }
        .into_parameters()
        .unwrap()
    }

    fn exercise(store: &dyn JobStore) {
        assert!(store.get("abc123").unwrap().is_none());

        let p = params();
        store.put_parameters("abc123", &p).unwrap();
        assert_eq!(store.get_parameters("abc123").unwrap(), Some(p));

        store.delete("abc123").unwrap();
        assert!(store.get("abc123").unwrap().is_none());
        // Second delete is a no-op.
        store.delete("abc123").unwrap();
    }

    #[test]
    fn test_memory_store() {
        let store = MemoryJobStore::new();
        exercise(&store);
        assert!(store.is_empty());
    }

    #[test]
    fn test_file_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path()).unwrap();
        exercise(&store);
    }

    fn exercise_purge(store: &dyn JobStore) {
        let mut old = params();
        old.created_at = 1_000;
        let mut fresh = params();
        fresh.created_at = 5_000;
        store.put_parameters("old", &old).unwrap();
        store.put_parameters("fresh", &fresh).unwrap();
        store.put("broken", b"not json".to_vec()).unwrap();

        assert_eq!(store.purge_created_before(2_000).unwrap(), 2);
        assert_eq!(store.job_ids().unwrap(), vec!["fresh".to_string()]);
        assert_eq!(store.get_parameters("fresh").unwrap(), Some(fresh));

        assert_eq!(store.purge_created_before(2_000).unwrap(), 0);
    }

    #[test]
    fn test_memory_store_purges_stale_entries() {
        exercise_purge(&MemoryJobStore::new());
    }

    #[test]
    fn test_file_store_purges_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("unrelated.txt"), b"keep").unwrap();
        let store = FileJobStore::new(dir.path()).unwrap();
        exercise_purge(&store);
        assert!(dir.path().join("unrelated.txt").exists());
    }

    #[test]
    fn test_file_store_sanitises_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileJobStore::new(dir.path()).unwrap();
        store.put("../../etc/passwd", b"{}".to_vec()).unwrap();

        let names: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().into_string().unwrap())
            .collect();
        assert_eq!(names, vec!["esa_job_etcpasswd.json".to_string()]);
    }

    #[test]
    fn test_corrupt_blob_reported() {
        let store = MemoryJobStore::new();
        store.put("bad", b"not json".to_vec()).unwrap();
        assert!(matches!(store.get_parameters("bad"), Err(StoreError::Corrupt(_))));
    }
}
