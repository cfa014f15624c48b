//! Index endpoints: status, search, clear, and the SSE rebuild stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::future::join_all;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::ats::models::find_review_stage;
use crate::errors::AppError;
use crate::progress::{progress_channel, sse_response, ProgressEvent, ProgressSender};
use crate::state::AppState;

use super::IndexOutcome;

/// Applications per page during the rebuild fetch.
const REBUILD_PAGE_SIZE: usize = 100;
const REBUILD_PAGE_DELAY: Duration = Duration::from_millis(300);
/// Resume fetches per extraction batch — I/O-bound against the document
/// host, not the ATS rate limit, so no inter-batch delay.
const EXTRACT_BATCH: usize = 25;

#[derive(Debug, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// GET /api/v1/jobs/:job_id/index/status
pub async fn handle_index_status(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Json<serde_json::Value> {
    let status = state.index.index_status(job_id);
    let backend = state.index.status();
    Json(json!({
        "exists": status.exists,
        "recordCount": status.record_count,
        "indexedAt": status.indexed_at,
        "backend": backend,
    }))
}

/// POST /api/v1/jobs/:job_id/index/search
pub async fn handle_search(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    if request.query.trim().is_empty() {
        return Err(AppError::Validation("Query must not be empty".to_string()));
    }
    let limit = request.limit.unwrap_or(10).clamp(1, 100);
    let hits = state
        .index
        .search(job_id, &request.query, limit)
        .await
        .map_err(|e| AppError::Index(e.to_string()))?;
    Ok(Json(json!({ "results": hits })))
}

/// DELETE /api/v1/jobs/:job_id/index
pub async fn handle_clear(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .index
        .clear(job_id)
        .map_err(|e| AppError::Index(e.to_string()))?;
    Ok(Json(json!({ "cleared": true })))
}

/// GET /api/v1/jobs/:job_id/index/stream
///
/// Full rebuild as an SSE stream: the old index file is deleted first,
/// then every active application is fetched, extracted, and upserted.
/// A client disconnect does not cancel the rebuild.
pub async fn handle_rebuild_stream(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = progress_channel();
    tokio::spawn(run_rebuild(state, job_id, tx));
    sse_response(rx)
}

async fn run_rebuild(state: AppState, job_id: i64, tx: ProgressSender) {
    tx.send(ProgressEvent::status("fetching", "Loading job"));

    let job = match state.ats.get_job(job_id).await {
        Ok(job) => job,
        Err(e) => {
            tx.send(ProgressEvent::error(format!("Failed to load job: {e}")));
            return;
        }
    };

    // Bulk screening operates on the review queue; without a matching
    // stage the whole pool is indexed.
    let review_stage = match state.ats.list_stages(job_id).await {
        Ok(stages) => find_review_stage(&stages, "application review").cloned(),
        Err(e) => {
            warn!("Stage lookup failed for job {job_id}: {e}");
            None
        }
    };

    let mut applications = match state
        .ats
        .fetch_all_applications(
            job_id,
            REBUILD_PAGE_SIZE,
            REBUILD_PAGE_DELAY,
            Some("active".to_string()),
            |page, count| tx.send(ProgressEvent::Fetching { page, count }),
        )
        .await
    {
        Ok(apps) => apps,
        Err(e) => {
            tx.send(ProgressEvent::error(format!(
                "Failed to fetch applications: {e}"
            )));
            return;
        }
    };

    if let Some(stage) = &review_stage {
        applications.retain(|a| a.stage.as_ref().map(|s| s.id) == Some(stage.id));
    }

    // Full replacement: the old file goes away before the first upsert.
    if let Err(e) = state.index.clear(job_id) {
        tx.send(ProgressEvent::error(format!("Failed to clear index: {e}")));
        return;
    }

    tx.send(ProgressEvent::status(
        "extracting",
        format!("Indexing {} applications", applications.len()),
    ));

    let total = applications.len();
    let mut processed = 0usize;
    let mut indexed = 0usize;
    let mut skipped = 0usize;
    let mut failed = 0usize;

    for chunk in applications.chunks(EXTRACT_BATCH) {
        let texts = join_all(chunk.iter().map(|app| {
            let extractor = state.extractor.clone();
            let url = app.resume_url.clone();
            async move {
                match url {
                    Some(url) => extractor.fetch_text(&url).await,
                    None => String::new(),
                }
            }
        }))
        .await;

        for (app, resume_text) in chunk.iter().zip(texts) {
            match state
                .index
                .index_candidate(
                    job_id,
                    &job.name,
                    app.id,
                    &app.candidate_name,
                    &resume_text,
                    &app.answers,
                )
                .await
            {
                Ok(IndexOutcome::Indexed) => indexed += 1,
                Ok(IndexOutcome::SkippedTooShort) => skipped += 1,
                Err(e) => {
                    failed += 1;
                    warn!("Indexing failed for application {}: {e}", app.id);
                }
            }
            processed += 1;
        }

        tx.send(ProgressEvent::progress(
            processed,
            total,
            chunk.last().map(|app| app.candidate_name.clone()),
        ));
    }

    tx.send(ProgressEvent::Complete {
        payload: json!({
            "jobId": job_id,
            "total": total,
            "indexed": indexed,
            "skipped": skipped,
            "failed": failed,
        }),
    });
}
