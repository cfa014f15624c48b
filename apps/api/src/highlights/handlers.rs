//! Highlights endpoint: the SSE tournament stream.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::sse::{Event, Sse};
use futures::future::join_all;
use futures::Stream;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::ats::models::find_review_stage;
use crate::progress::{progress_channel, sse_response, ProgressEvent, ProgressSender};
use crate::state::AppState;

use super::{RankingCandidate, DEFAULT_TOP_N};

const FETCH_PAGE_SIZE: usize = 100;
const FETCH_PAGE_DELAY: Duration = Duration::from_millis(300);
/// Resume extraction fan-out; document-host I/O, no pacing needed.
const EXTRACT_BATCH: usize = 50;

#[derive(Debug, Deserialize)]
pub struct HighlightsQuery {
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// GET /api/v1/jobs/:job_id/highlights/stream?top_n=100
pub async fn handle_highlights_stream(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Query(query): Query<HighlightsQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let top_n = query.top_n.unwrap_or(DEFAULT_TOP_N);
    let (tx, rx) = progress_channel();
    tokio::spawn(run_highlights(state, job_id, top_n, tx));
    sse_response(rx)
}

async fn run_highlights(state: AppState, job_id: i64, top_n: usize, tx: ProgressSender) {
    tx.send(ProgressEvent::status("fetching", "Loading job"));

    let job = match state.ats.get_job(job_id).await {
        Ok(job) => job,
        Err(e) => {
            tx.send(ProgressEvent::error(format!("Failed to load job: {e}")));
            return;
        }
    };

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
            FETCH_PAGE_SIZE,
            FETCH_PAGE_DELAY,
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

    tx.send(ProgressEvent::status(
        "extracting",
        format!("Extracting {} resumes", applications.len()),
    ));

    // Pull resume text for the whole pool before phase 1.
    let total = applications.len();
    let mut candidates = Vec::with_capacity(total);
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
            let answers_text = app
                .answers
                .iter()
                .filter(|a| !a.answer.trim().is_empty())
                .map(|a| format!("Q: {}\nA: {}", a.question, a.answer))
                .collect::<Vec<_>>()
                .join("\n");
            candidates.push(RankingCandidate {
                application_id: app.id,
                candidate_id: app.candidate_id,
                name: app.candidate_name.clone(),
                resume_text,
                answers_text,
            });
        }
        tx.send(ProgressEvent::progress(candidates.len(), total, None));
    }

    let progress_tx = tx.clone();
    match state
        .highlights
        .run(&job.name, candidates, top_n, move |event| {
            progress_tx.send(event)
        })
        .await
    {
        Ok(highlights) => {
            tx.send(ProgressEvent::Complete {
                payload: json!({
                    "jobId": job_id,
                    "jobTitle": job.name,
                    "count": highlights.len(),
                    "highlights": highlights,
                }),
            });
        }
        Err(e) => {
            tx.send(ProgressEvent::error(format!("Ranking failed: {e}")));
        }
    }
}
