use std::sync::Arc;

use packforge_pipeline::orchestrator::ConversionOrchestrator;
use packforge_pipeline::service::PackService;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheap to clone: everything is behind an `Arc`.
#[derive(Clone)]
pub struct AppState {
    /// Database pool, absent when running on in-memory repositories.
    pub pool: Option<packforge_db::DbPool>,
    /// Pack upload, lookup and deletion.
    pub packs: Arc<PackService>,
    /// Conversion job creation and execution.
    pub orchestrator: Arc<ConversionOrchestrator>,
}
