//! Application mutation endpoints: bulk reject and advance.

use axum::extract::{Path, State};
use axum::Json;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct BulkRejectRequest {
    pub application_ids: Vec<i64>,
    pub reason_id: i64,
    #[serde(default)]
    pub email_template_id: Option<i64>,
}

/// Partial failure is a valid, non-error response: callers see exactly
/// which rejections landed.
#[derive(Debug, Serialize)]
pub struct BulkRejectResponse {
    pub rejected: Vec<i64>,
    pub failed: Vec<i64>,
}

/// POST /api/v1/applications/bulk-reject
pub async fn handle_bulk_reject(
    State(state): State<AppState>,
    Json(request): Json<BulkRejectRequest>,
) -> Result<Json<BulkRejectResponse>, AppError> {
    if request.application_ids.is_empty() {
        return Err(AppError::Validation("No application ids given".to_string()));
    }

    let (rejected, failed) = attempt_each(&request.application_ids, |id| {
        let ats = state.ats.clone();
        async move {
            ats.reject_application(id, request.reason_id, request.email_template_id)
                .await
        }
    })
    .await;

    info!(
        "Bulk reject: {} succeeded, {} failed",
        rejected.len(),
        failed.len()
    );
    Ok(Json(BulkRejectResponse { rejected, failed }))
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub from_stage_id: i64,
}

/// POST /api/v1/applications/:id/advance
pub async fn handle_advance(
    State(state): State<AppState>,
    Path(application_id): Path<i64>,
    Json(request): Json<AdvanceRequest>,
) -> Result<Json<serde_json::Value>, AppError> {
    state
        .ats
        .advance_application(application_id, request.from_stage_id)
        .await?;
    Ok(Json(serde_json::json!({ "advanced": true })))
}

/// Attempts `op` for every id independently and concurrently, splitting
/// ids into succeeded and failed. Never errors as a whole.
async fn attempt_each<F, Fut, E>(ids: &[i64], op: F) -> (Vec<i64>, Vec<i64>)
where
    F: Fn(i64) -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let results = join_all(ids.iter().map(|&id| {
        let fut = op(id);
        async move { (id, fut.await) }
    }))
    .await;

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();
    for (id, result) in results {
        match result {
            Ok(()) => succeeded.push(id),
            Err(e) => {
                warn!("Mutation failed for application {id}: {e}");
                failed.push(id);
            }
        }
    }
    (succeeded, failed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_attempt_each_splits_partial_failure() {
        // Reject [A, B, C] where B fails upstream: rejected=[A, C], failed=[B].
        let (ok, failed) = attempt_each(&[1, 2, 3], |id| async move {
            if id == 2 {
                Err("upstream 422".to_string())
            } else {
                Ok(())
            }
        })
        .await;

        assert_eq!(ok, vec![1, 3]);
        assert_eq!(failed, vec![2]);
    }

    #[tokio::test]
    async fn test_attempt_each_all_success() {
        let (ok, failed) =
            attempt_each(&[10, 20], |_| async { Ok::<(), String>(()) }).await;
        assert_eq!(ok, vec![10, 20]);
        assert!(failed.is_empty());
    }

    #[tokio::test]
    async fn test_attempt_each_all_failures_still_returns() {
        let (ok, failed) =
            attempt_each(&[1, 2], |_| async { Err::<(), _>("down".to_string()) }).await;
        assert!(ok.is_empty());
        assert_eq!(failed, vec![1, 2]);
    }
}
