pub mod applications;
pub mod health;
pub mod jobs;
pub mod settings;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::highlights::handlers as highlights_handlers;
use crate::index::handlers as index_handlers;
use crate::screening::handlers as screening_handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // ATS read endpoints
        .route("/api/v1/jobs", get(jobs::handle_list_jobs))
        .route("/api/v1/jobs/:job_id/stages", get(jobs::handle_list_stages))
        .route(
            "/api/v1/jobs/:job_id/applications",
            get(jobs::handle_list_applications),
        )
        .route(
            "/api/v1/jobs/:job_id/export/stream",
            get(jobs::handle_export_stream),
        )
        // Mutations
        .route(
            "/api/v1/applications/bulk-reject",
            post(applications::handle_bulk_reject),
        )
        .route(
            "/api/v1/applications/:id/advance",
            post(applications::handle_advance),
        )
        // Screening
        .route(
            "/api/v1/jobs/:job_id/screen",
            post(screening_handlers::handle_screen),
        )
        // Highlights (tournament ranking)
        .route(
            "/api/v1/jobs/:job_id/highlights/stream",
            get(highlights_handlers::handle_highlights_stream),
        )
        // Embedding index
        .route(
            "/api/v1/jobs/:job_id/index/stream",
            get(index_handlers::handle_rebuild_stream),
        )
        .route(
            "/api/v1/jobs/:job_id/index/status",
            get(index_handlers::handle_index_status),
        )
        .route(
            "/api/v1/jobs/:job_id/index/search",
            post(index_handlers::handle_search),
        )
        .route("/api/v1/jobs/:job_id/index", delete(index_handlers::handle_clear))
        // Settings
        .route(
            "/api/v1/settings",
            get(settings::handle_get_settings).put(settings::handle_update_settings),
        )
        .with_state(state)
}
