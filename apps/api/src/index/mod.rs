//! Embedding Index — one flat-file vector index per job with brute-force
//! cosine-similarity search.

pub mod embedder;
pub mod handlers;
pub mod similarity;
pub mod store;

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use crate::ats::models::Answer;
use embedder::Embedder;
use similarity::cosine_similarity;
use store::{EmbeddingRecord, IndexStore, JobIndex};

/// Combined text under this length carries no signal worth indexing.
const MIN_INDEXABLE_CHARS: usize = 50;
/// Upstream model token-limit guard.
const MAX_EMBED_CHARS: usize = 8_000;
/// Stored alongside each vector and returned with search hits.
const PREVIEW_CHARS: usize = 200;

/// Outcome of a single index call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexOutcome {
    Indexed,
    SkippedTooShort,
}

#[derive(Debug, Serialize)]
pub struct SearchHit {
    pub application_id: i64,
    pub candidate_name: String,
    pub preview: String,
    pub score: f32,
}

#[derive(Debug, Serialize)]
pub struct IndexStatus {
    pub exists: bool,
    pub record_count: usize,
    pub indexed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct BackendStatus {
    pub ready: bool,
    pub model: String,
}

pub struct EmbeddingIndex {
    store: IndexStore,
    embedder: Arc<dyn Embedder>,
}

impl EmbeddingIndex {
    pub fn new(store: IndexStore, embedder: Arc<dyn Embedder>) -> Self {
        Self { store, embedder }
    }

    /// Whether the embedding backend is loaded. Loading happens lazily on
    /// the first real embed call, not here.
    pub fn status(&self) -> BackendStatus {
        BackendStatus {
            ready: self.embedder.is_ready(),
            model: self.embedder.model_name().to_string(),
        }
    }

    /// Embeds one candidate and upserts the record into the job's index.
    /// Text under 50 characters after concatenation is skipped (logged,
    /// not an error).
    pub async fn index_candidate(
        &self,
        job_id: i64,
        job_title: &str,
        application_id: i64,
        candidate_name: &str,
        resume_text: &str,
        answers: &[Answer],
    ) -> Result<IndexOutcome> {
        let blob = build_text_blob(candidate_name, resume_text, answers);
        if blob.chars().count() < MIN_INDEXABLE_CHARS {
            debug!(
                "Skipping application {application_id} for job {job_id}: {} chars of text",
                blob.chars().count()
            );
            return Ok(IndexOutcome::SkippedTooShort);
        }

        let truncated: String = blob.chars().take(MAX_EMBED_CHARS).collect();
        let vector = self.embedder.embed(&truncated).await?;

        let mut index = self
            .store
            .load(job_id)
            .unwrap_or_else(|| JobIndex::new(job_id, job_title.to_string()));
        index.job_title = job_title.to_string();
        index.upsert(EmbeddingRecord {
            application_id,
            candidate_name: candidate_name.to_string(),
            preview: truncated.chars().take(PREVIEW_CHARS).collect(),
            vector,
            indexed_at: Utc::now(),
        });
        self.store.save(&index)?;

        Ok(IndexOutcome::Indexed)
    }

    /// Brute-force cosine search over every stored vector in the job's
    /// index. No index (or an unreadable one) yields an empty result.
    pub async fn search(&self, job_id: i64, query: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let Some(index) = self.store.load(job_id) else {
            return Ok(Vec::new());
        };

        let query_vector = self.embedder.embed(query).await?;

        let mut hits: Vec<SearchHit> = index
            .records
            .iter()
            .map(|r| SearchHit {
                application_id: r.application_id,
                candidate_name: r.candidate_name.clone(),
                preview: r.preview.clone(),
                score: cosine_similarity(&query_vector, &r.vector),
            })
            .collect();

        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(limit);
        Ok(hits)
    }

    pub fn index_status(&self, job_id: i64) -> IndexStatus {
        match self.store.load(job_id) {
            Some(index) => IndexStatus {
                exists: true,
                record_count: index.records.len(),
                indexed_at: Some(index.indexed_at),
            },
            None => IndexStatus {
                exists: false,
                record_count: 0,
                indexed_at: None,
            },
        }
    }

    /// Deletes the job's index file; subsequent index calls start fresh.
    pub fn clear(&self, job_id: i64) -> Result<()> {
        self.store.delete(job_id)?;
        info!("Cleared index for job {job_id}");
        Ok(())
    }
}

/// Name + resume + formatted Q&A, the text that gets embedded.
fn build_text_blob(candidate_name: &str, resume_text: &str, answers: &[Answer]) -> String {
    let mut blob = String::new();
    blob.push_str(candidate_name);
    blob.push('\n');
    blob.push_str(resume_text.trim());
    for answer in answers {
        if answer.answer.trim().is_empty() {
            continue;
        }
        blob.push_str("\nQ: ");
        blob.push_str(&answer.question);
        blob.push_str("\nA: ");
        blob.push_str(&answer.answer);
    }
    blob
}

#[cfg(test)]
mod tests {
    use super::embedder::test_support::StubEmbedder;
    use super::*;

    fn service(dir: &std::path::Path) -> EmbeddingIndex {
        EmbeddingIndex::new(IndexStore::new(dir), Arc::new(StubEmbedder::new(16)))
    }

    fn long_resume() -> String {
        "Experienced Rust engineer with a decade of distributed systems work, \
         including storage engines and network services."
            .to_string()
    }

    #[tokio::test]
    async fn test_short_text_is_a_no_op() {
        let dir = tempfile::tempdir().unwrap();
        let index = service(dir.path());

        let outcome = index
            .index_candidate(1, "Engineer", 100, "Jo", "short", &[])
            .await
            .unwrap();
        assert_eq!(outcome, IndexOutcome::SkippedTooShort);
        assert_eq!(index.index_status(1).record_count, 0);
        assert!(!index.index_status(1).exists);
    }

    #[tokio::test]
    async fn test_reindexing_same_application_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let index = service(dir.path());

        index
            .index_candidate(1, "Engineer", 100, "Ada Lovelace", &long_resume(), &[])
            .await
            .unwrap();
        index
            .index_candidate(1, "Engineer", 100, "Ada Lovelace", &long_resume(), &[])
            .await
            .unwrap();

        let status = index.index_status(1);
        assert_eq!(status.record_count, 1);
        assert!(status.exists);
        assert!(status.indexed_at.is_some());
    }

    #[tokio::test]
    async fn test_search_bounds_and_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let index = service(dir.path());

        for (id, name) in [(1i64, "Ada"), (2, "Grace"), (3, "Edsger")] {
            index
                .index_candidate(9, "Engineer", id, name, &long_resume(), &[])
                .await
                .unwrap();
        }

        let hits = index.search(9, "rust distributed systems", 2).await.unwrap();
        assert_eq!(hits.len(), 2); // min(K=3, limit=2)
        assert!(hits[0].score >= hits[1].score);

        let all = index.search(9, "rust distributed systems", 10).await.unwrap();
        assert_eq!(all.len(), 3); // never more than K records
    }

    #[tokio::test]
    async fn test_search_without_index_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let index = service(dir.path());
        let hits = index.search(404, "anything", 5).await.unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    async fn test_clear_then_reindex_starts_fresh() {
        let dir = tempfile::tempdir().unwrap();
        let index = service(dir.path());

        index
            .index_candidate(2, "Engineer", 1, "Ada", &long_resume(), &[])
            .await
            .unwrap();
        index.clear(2).unwrap();
        assert!(!index.index_status(2).exists);

        index
            .index_candidate(2, "Engineer", 5, "Grace", &long_resume(), &[])
            .await
            .unwrap();
        let status = index.index_status(2);
        assert_eq!(status.record_count, 1);
    }

    #[test]
    fn test_text_blob_includes_answers() {
        let answers = vec![
            Answer {
                question: "Why here?".to_string(),
                answer: "Hard problems.".to_string(),
            },
            Answer {
                question: "Visa?".to_string(),
                answer: "  ".to_string(), // blank answers are skipped
            },
        ];
        let blob = build_text_blob("Ada", "Resume body", &answers);
        assert!(blob.contains("Q: Why here?"));
        assert!(blob.contains("A: Hard problems."));
        assert!(!blob.contains("Visa?"));
    }
}
