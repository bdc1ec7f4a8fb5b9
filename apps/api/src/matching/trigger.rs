//! Post-upload pipeline triggers.
//!
//! Upload handlers hand off to a `WorkflowTrigger` after commit and never
//! wait for the pipeline: trigger failures are logged on their own channel
//! and the HTTP response succeeds regardless. The disabled implementation
//! makes "no pipeline configured" an explicit capability instead of a
//! nullable client.

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::extraction::worker::{run_application_extraction, run_lender_extraction};
use crate::llm_client::LlmClient;
use crate::matching::orchestrator::MatchingOrchestrator;

#[async_trait]
pub trait WorkflowTrigger: Send + Sync {
    /// Dispatches structured extraction for an uploaded lender document.
    /// Returns a run id for correlation, or `None` when disabled.
    async fn trigger_lender_processing(&self, lender_id: Uuid) -> Option<String>;

    /// Dispatches extraction plus the full matching pipeline for an uploaded
    /// loan application. Returns a run id, or `None` when disabled.
    async fn trigger_application_matching(&self, application_id: Uuid) -> Option<String>;
}

/// Runs pipelines as spawned Tokio tasks in-process.
pub struct SpawnedWorkflowTrigger {
    pool: PgPool,
    llm: LlmClient,
    orchestrator: Arc<MatchingOrchestrator>,
}

impl SpawnedWorkflowTrigger {
    pub fn new(pool: PgPool, llm: LlmClient, orchestrator: Arc<MatchingOrchestrator>) -> Self {
        Self {
            pool,
            llm,
            orchestrator,
        }
    }
}

#[async_trait]
impl WorkflowTrigger for SpawnedWorkflowTrigger {
    async fn trigger_lender_processing(&self, lender_id: Uuid) -> Option<String> {
        let run_id = Uuid::new_v4().to_string();
        info!("Triggering lender processing for {lender_id} (run {run_id})");

        let pool = self.pool.clone();
        let llm = self.llm.clone();
        tokio::spawn(async move {
            // Failures already transitioned the record to `failed`; this
            // channel only logs them.
            if let Err(e) = run_lender_extraction(&pool, &llm, lender_id).await {
                error!("Lender processing run failed for {lender_id}: {e}");
            }
        });

        Some(run_id)
    }

    async fn trigger_application_matching(&self, application_id: Uuid) -> Option<String> {
        let run_id = Uuid::new_v4().to_string();
        info!("Triggering matching workflow for application {application_id} (run {run_id})");

        let pool = self.pool.clone();
        let llm = self.llm.clone();
        let orchestrator = Arc::clone(&self.orchestrator);
        tokio::spawn(async move {
            if let Err(e) = run_application_extraction(&pool, &llm, application_id).await {
                error!(
                    "Application extraction failed for {application_id}; skipping matching: {e}"
                );
                return;
            }
            match orchestrator.run(application_id).await {
                Ok(summary) => {
                    info!(
                        "Matching run for {application_id} finished: {}/{} matches succeeded{}",
                        summary.success_count,
                        summary.lender_count,
                        if summary.all_failed() {
                            " (all matches failed)"
                        } else {
                            ""
                        }
                    );
                }
                Err(e) => error!("Matching run failed for {application_id}: {e}"),
            }
        });

        Some(run_id)
    }
}

/// No-op trigger used when MATCHING_ENABLED=false: uploads still succeed and
/// records stay in `uploaded` status.
pub struct DisabledWorkflowTrigger;

#[async_trait]
impl WorkflowTrigger for DisabledWorkflowTrigger {
    async fn trigger_lender_processing(&self, lender_id: Uuid) -> Option<String> {
        debug!("Matching pipeline disabled; lender {lender_id} left in uploaded status");
        None
    }

    async fn trigger_application_matching(&self, application_id: Uuid) -> Option<String> {
        debug!("Matching pipeline disabled; application {application_id} left in uploaded status");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_trigger_returns_no_run_id() {
        let trigger = DisabledWorkflowTrigger;
        assert!(trigger.trigger_lender_processing(Uuid::new_v4()).await.is_none());
        assert!(trigger
            .trigger_application_matching(Uuid::new_v4())
            .await
            .is_none());
    }
}
