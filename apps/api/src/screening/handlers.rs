use axum::extract::{Path, State};
use axum::Json;
use serde::Deserialize;
use tracing::info;

use crate::errors::AppError;
use crate::state::AppState;

use super::verdict::ScreeningOutcome;
use super::{Disagreement, ScreeningCandidate};

#[derive(Debug, Deserialize)]
pub struct ScreenRequest {
    pub job_title: String,
    #[serde(default)]
    pub requirements: String,
    pub candidates: Vec<ScreeningCandidate>,
    /// Recent human overrides used to calibrate strictness.
    #[serde(default)]
    pub disagreements: Vec<Disagreement>,
}

/// POST /api/v1/jobs/:job_id/screen
pub async fn handle_screen(
    State(state): State<AppState>,
    Path(job_id): Path<i64>,
    Json(request): Json<ScreenRequest>,
) -> Result<Json<ScreeningOutcome>, AppError> {
    info!(
        "Screen request for job {job_id}: {} candidate(s), {} disagreement(s)",
        request.candidates.len(),
        request.disagreements.len()
    );
    let outcome = state
        .screening
        .screen_batch(
            &request.job_title,
            &request.requirements,
            &request.candidates,
            &request.disagreements,
        )
        .await?;
    Ok(Json(outcome))
}
