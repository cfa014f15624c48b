//! Flat-file persistence for per-job indexes: one JSON document per job,
//! fully rewritten on every save.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One embedded candidate record, keyed by application id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingRecord {
    pub application_id: i64,
    pub candidate_name: String,
    /// Truncated text preview returned with search hits.
    pub preview: String,
    pub vector: Vec<f32>,
    pub indexed_at: DateTime<Utc>,
}

/// The on-disk index document for one job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobIndex {
    pub job_id: i64,
    pub job_title: String,
    pub indexed_at: DateTime<Utc>,
    pub records: Vec<EmbeddingRecord>,
}

impl JobIndex {
    pub fn new(job_id: i64, job_title: String) -> Self {
        Self {
            job_id,
            job_title,
            indexed_at: Utc::now(),
            records: Vec::new(),
        }
    }

    /// Replace-or-append by application id; bumps the index timestamp.
    pub fn upsert(&mut self, record: EmbeddingRecord) {
        self.indexed_at = Utc::now();
        match self
            .records
            .iter_mut()
            .find(|r| r.application_id == record.application_id)
        {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }
}

pub struct IndexStore {
    data_dir: PathBuf,
}

impl IndexStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// One file per job; the job id is encoded in the filename.
    fn index_path(&self, job_id: i64) -> PathBuf {
        self.data_dir.join(format!("index_{job_id}.json"))
    }

    /// Loads a job's index. A missing, unreadable, or corrupt file is
    /// treated as "no index" — the caller can always rebuild.
    pub fn load(&self, job_id: i64) -> Option<JobIndex> {
        let path = self.index_path(job_id);
        let raw = std::fs::read_to_string(&path).ok()?;
        match serde_json::from_str(&raw) {
            Ok(index) => Some(index),
            Err(e) => {
                warn!("Index file {} is corrupt ({e}); treating as absent", path.display());
                None
            }
        }
    }

    /// Full-document rewrite. There is no cross-process locking; the last
    /// writer wins at the file level.
    pub fn save(&self, index: &JobIndex) -> Result<()> {
        std::fs::create_dir_all(&self.data_dir)
            .with_context(|| format!("creating index dir {}", self.data_dir.display()))?;
        let path = self.index_path(index.job_id);
        let raw = serde_json::to_string(index)?;
        std::fs::write(&path, raw).with_context(|| format!("writing {}", path.display()))?;
        Ok(())
    }

    /// Deletes the job's index file outright. Missing files are fine.
    pub fn delete(&self, job_id: i64) -> Result<()> {
        let path = self.index_path(job_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("deleting {}", path.display())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: i64, name: &str) -> EmbeddingRecord {
        EmbeddingRecord {
            application_id: id,
            candidate_name: name.to_string(),
            preview: format!("{name} preview"),
            vector: vec![1.0, 0.0],
            indexed_at: Utc::now(),
        }
    }

    #[test]
    fn test_upsert_replaces_never_duplicates() {
        let mut index = JobIndex::new(1, "Engineer".to_string());
        index.upsert(record(42, "First"));
        index.upsert(record(42, "Second"));
        assert_eq!(index.records.len(), 1);
        assert_eq!(index.records[0].candidate_name, "Second");

        index.upsert(record(43, "Third"));
        assert_eq!(index.records.len(), 2);
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let mut index = JobIndex::new(7, "Engineer".to_string());
        index.upsert(record(1, "Ada"));
        store.save(&index).unwrap();

        let loaded = store.load(7).unwrap();
        assert_eq!(loaded.job_id, 7);
        assert_eq!(loaded.job_title, "Engineer");
        assert_eq!(loaded.records.len(), 1);
    }

    #[test]
    fn test_load_missing_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        assert!(store.load(99).is_none());
    }

    #[test]
    fn test_load_corrupt_is_none_not_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        std::fs::write(dir.path().join("index_5.json"), "{broken").unwrap();
        assert!(store.load(5).is_none());
    }

    #[test]
    fn test_delete_removes_file_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = IndexStore::new(dir.path());
        let index = JobIndex::new(3, "Engineer".to_string());
        store.save(&index).unwrap();
        store.delete(3).unwrap();
        assert!(store.load(3).is_none());
        store.delete(3).unwrap(); // second delete is a no-op
    }
}
