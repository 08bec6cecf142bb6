use std::sync::Arc;

use crate::export::ExportService;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Owns the repository, content source, artifact store, fonts and notifier.
    pub exports: Arc<ExportService>,
}
