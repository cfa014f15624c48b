//! Job listing endpoints plus the full-collection export stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use axum::Json;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;

use crate::ats::models::{ApplicationsPage, Job, Stage};
use crate::ats::PageOptions;
use crate::errors::AppError;
use crate::progress::{progress_channel, sse_response, ProgressEvent, ProgressSender};
use crate::state::AppState;

const EXPORT_PAGE_SIZE: usize = 100;
/// Export has no per-candidate work between pages; pace the pages harder.
const EXPORT_PAGE_DELAY: Duration = Duration::from_millis(1000);

/// GET /api/v1/jobs
pub async fn handle_list_jobs(State(state): State<AppState>) -> Result<Json<Vec<Job>>, AppError> {
    Ok(Json(state.ats.list_jobs().await?))
}

/// GET /api/v1/jobs/:job_id/stages
pub async fn handle_list_stages(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Result<Json<Vec<Stage>>, AppError> {
    Ok(Json(state.ats.list_stages(job_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct ApplicationsQuery {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub per_page: Option<usize>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub stage_id: Option<i64>,
    /// Skip per-candidate enrichment (no email/phone) — an order of
    /// magnitude fewer upstream requests.
    #[serde(default)]
    pub lightweight: Option<bool>,
}

/// GET /api/v1/jobs/:job_id/applications
pub async fn handle_list_applications(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Query(query): Query<ApplicationsQuery>,
) -> Result<Json<ApplicationsPage>, AppError> {
    let opts = PageOptions {
        page: query.page.unwrap_or(1),
        per_page: query.per_page.unwrap_or(50).clamp(1, 500),
        status: query.status,
        stage_id: query.stage_id,
    };

    let page = if query.lightweight.unwrap_or(false) {
        state.ats.list_applications_page_lightweight(job_id, &opts).await?
    } else {
        state.ats.list_applications_page(job_id, &opts).await?
    };
    Ok(Json(page))
}

/// GET /api/v1/jobs/:job_id/export/stream
///
/// Streams progress while every application is fetched through the
/// lightweight path; the `complete` event carries the full row set.
pub async fn handle_export_stream(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (tx, rx) = progress_channel();
    tokio::spawn(run_export(state, job_id, tx));
    sse_response(rx)
}

async fn run_export(state: AppState, job_id: i64, tx: ProgressSender) {
    tx.send(ProgressEvent::status("fetching", "Exporting applications"));

    let applications = match state
        .ats
        .fetch_all_applications(
            job_id,
            EXPORT_PAGE_SIZE,
            EXPORT_PAGE_DELAY,
            Some("active".to_string()),
            |page, count| tx.send(ProgressEvent::Fetching { page, count }),
        )
        .await
    {
        Ok(apps) => apps,
        Err(e) => {
            tx.send(ProgressEvent::error(format!("Export failed: {e}")));
            return;
        }
    };

    tx.send(ProgressEvent::Complete {
        payload: json!({
            "jobId": job_id,
            "count": applications.len(),
            "applications": applications,
        }),
    });
}
