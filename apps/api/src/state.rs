use std::sync::Arc;

use sqlx::PgPool;

use crate::matching::trigger::WorkflowTrigger;
use crate::ocr::TextExtractor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    /// Text extractor for uploaded PDFs. Default: `PdfTextExtractor`.
    /// Injected so tests can substitute a canned extractor.
    pub extractor: Arc<dyn TextExtractor>,
    /// Post-upload pipeline trigger. `SpawnedWorkflowTrigger` in normal
    /// operation, `DisabledWorkflowTrigger` when MATCHING_ENABLED=false.
    pub workflows: Arc<dyn WorkflowTrigger>,
}
