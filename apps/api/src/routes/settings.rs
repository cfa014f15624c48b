//! Settings endpoints. Key values never leave the server — responses only
//! say whether each credential is set.

use axum::extract::State;
use axum::Json;
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::settings::SettingsPatch;
use crate::state::AppState;

fn view(settings: &crate::settings::Settings) -> Value {
    json!({
        "atsApiKeySet": !settings.ats_api_key.is_empty(),
        "anthropicApiKeySet": !settings.anthropic_api_key.is_empty(),
        "atsOnBehalfOf": settings.ats_on_behalf_of,
    })
}

/// GET /api/v1/settings
pub async fn handle_get_settings(State(state): State<AppState>) -> Json<Value> {
    Json(view(&state.settings.snapshot()))
}

/// PUT /api/v1/settings
///
/// Applies a partial update; the new snapshot takes effect for all
/// subsequent outbound calls without a restart.
pub async fn handle_update_settings(
    State(state): State<AppState>,
    Json(patch): Json<SettingsPatch>,
) -> Result<Json<Value>, AppError> {
    let updated = state.settings.update(patch).map_err(AppError::Internal)?;
    Ok(Json(view(&updated)))
}
