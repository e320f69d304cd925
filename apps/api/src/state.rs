use std::sync::Arc;

use crate::config::Config;
use crate::extraction::DocumentExtractor;
use crate::rating::RunCoordinator;
use crate::sessions::SessionStore;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<RunCoordinator>,
    /// Same store the coordinator writes to; read directly by the history endpoint.
    pub sessions: Arc<dyn SessionStore>,
    /// Default: `PdfExtractor`.
    pub extractor: Arc<dyn DocumentExtractor>,
    pub config: Config,
}
