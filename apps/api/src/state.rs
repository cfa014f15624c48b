use std::sync::Arc;

use crate::ats::AtsClient;
use crate::extract::DocumentExtractor;
use crate::highlights::HighlightsPipeline;
use crate::index::EmbeddingIndex;
use crate::screening::ScreeningService;
use crate::settings::SettingsStore;

/// Shared application state injected into all route handlers via Axum
/// extractors. Components receive their configuration at construction and
/// read credential snapshots from the settings store per call.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<SettingsStore>,
    pub ats: AtsClient,
    pub extractor: DocumentExtractor,
    pub index: Arc<EmbeddingIndex>,
    pub screening: ScreeningService,
    pub highlights: Arc<HighlightsPipeline>,
}
