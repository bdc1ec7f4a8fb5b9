//! The three-phase matching pipeline: prepare → parallel dispatch → finalize.
//!
//! Phase 1 materializes the full candidate set as `pending` rows before any
//! scoring starts, so a poller sees a consistent "N pending" snapshot.
//! Phase 2 fans one worker out per (application, lender) pair; each worker's
//! outcome is a typed `PairOutcome`, returned rather than thrown, and the
//! join is a barrier. Phase 3 unconditionally marks the application
//! `completed` — "matching finished", not "all matches succeeded" — and
//! reports aggregate counts.

use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::matching::scoring::MatchScorer;
use crate::matching::store::{LenderCandidate, MatchStore};
use crate::models::status::DocumentStatus;

const PREPARE_TIMEOUT: Duration = Duration::from_secs(60);
const DISPATCH_TIMEOUT: Duration = Duration::from_secs(300);
const FINALIZE_TIMEOUT: Duration = Duration::from_secs(30);

const TIMEOUT_ERROR: &str = "Match calculation timed out";

/// Aggregate result of one matching run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub application_id: Uuid,
    pub lender_count: usize,
    pub success_count: usize,
    pub failure_count: usize,
}

impl RunSummary {
    /// Derivable "every attempted match failed" signal. The application
    /// status stays `completed` either way; callers that care inspect this.
    pub fn all_failed(&self) -> bool {
        self.lender_count > 0 && self.success_count == 0
    }
}

/// Terminal result of one pair's worker. Always returned, never thrown:
/// a failing pair must not abort or block its siblings.
#[derive(Debug)]
enum PairOutcome {
    Success { lender_id: Uuid, score: f64 },
    Failure { lender_id: Uuid, error: String },
}

pub struct MatchingOrchestrator {
    store: Arc<dyn MatchStore>,
    scorer: Arc<dyn MatchScorer>,
}

impl MatchingOrchestrator {
    pub fn new(store: Arc<dyn MatchStore>, scorer: Arc<dyn MatchScorer>) -> Self {
        Self { store, scorer }
    }

    /// Runs the full pipeline for one application. On orchestration-level
    /// failure the application is marked `failed` (best effort) and the
    /// error is returned to the trigger's failure channel.
    pub async fn run(&self, application_id: Uuid) -> Result<RunSummary, AppError> {
        match self.run_inner(application_id).await {
            Ok(summary) => Ok(summary),
            Err(e) => {
                if let Err(update_err) = self
                    .store
                    .set_application_status(application_id, DocumentStatus::Failed)
                    .await
                {
                    error!("Failed to mark application {application_id} as failed: {update_err}");
                }
                Err(e)
            }
        }
    }

    async fn run_inner(&self, application_id: Uuid) -> Result<RunSummary, AppError> {
        info!("Step 1: Preparing matching for application {application_id}");
        let candidates = timeout(PREPARE_TIMEOUT, self.prepare(application_id))
            .await
            .map_err(|_| AppError::Internal(anyhow!("Prepare phase timed out")))??;

        let (success_count, failure_count) = if candidates.is_empty() {
            warn!("No unresolved lender pairs; skipping dispatch");
            (0, 0)
        } else {
            info!(
                "Step 2: Calculating matches in parallel for {} lenders",
                candidates.len()
            );
            match timeout(DISPATCH_TIMEOUT, self.dispatch(application_id, &candidates)).await {
                Ok(counts) => counts,
                Err(_) => {
                    // Dropping the dispatch future aborts still-running
                    // workers; sweep their records to a terminal state.
                    warn!(
                        "Dispatch phase timed out after {:?}; failing unresolved matches",
                        DISPATCH_TIMEOUT
                    );
                    self.store
                        .fail_unresolved_matches(application_id, TIMEOUT_ERROR)
                        .await?;
                    let lender_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
                    let (completed, failed) = self
                        .store
                        .match_status_counts(application_id, &lender_ids)
                        .await?;
                    (completed as usize, failed as usize)
                }
            }
        };

        info!("Step 3: Finalizing matching for application {application_id}");
        timeout(
            FINALIZE_TIMEOUT,
            self.finalize(application_id, candidates.len(), success_count, failure_count),
        )
        .await
        .map_err(|_| AppError::Internal(anyhow!("Finalize phase timed out")))?
    }

    /// Phase 1: snapshot eligible lenders, materialize the candidate set as
    /// `pending` rows durably before any scoring begins, then narrow to the
    /// pairs still `pending`. A re-run therefore dispatches only unresolved
    /// pairs; each match record walks pending → processing → terminal once.
    async fn prepare(&self, application_id: Uuid) -> Result<Vec<LenderCandidate>, AppError> {
        let mut candidates = self.store.completed_lenders().await?;
        info!("Found {} active lenders", candidates.len());

        if candidates.is_empty() {
            return Ok(candidates);
        }

        let lender_ids: Vec<Uuid> = candidates.iter().map(|c| c.id).collect();
        let created = self
            .store
            .create_pending_matches(application_id, &lender_ids)
            .await?;
        if (created as usize) < lender_ids.len() {
            info!(
                "Skipped {} existing match records for application {application_id}",
                lender_ids.len() - created as usize
            );
        }

        let pending = self.store.pending_lender_ids(application_id).await?;
        candidates.retain(|c| pending.contains(&c.id));

        self.store
            .set_application_status(application_id, DocumentStatus::Processing)
            .await?;

        Ok(candidates)
    }

    /// Phase 2: one worker per pair, joined as a barrier. A panicked worker
    /// counts as a failure; its match row is swept by the caller's timeout
    /// path or left for `fail_unresolved_matches` if the run is re-driven.
    async fn dispatch(
        &self,
        application_id: Uuid,
        candidates: &[LenderCandidate],
    ) -> (usize, usize) {
        let mut workers: JoinSet<PairOutcome> = JoinSet::new();

        for candidate in candidates {
            let store = Arc::clone(&self.store);
            let scorer = Arc::clone(&self.scorer);
            let candidate = candidate.clone();
            workers.spawn(async move {
                score_pair(store.as_ref(), scorer.as_ref(), application_id, candidate).await
            });
        }

        let mut success_count = 0;
        let mut failure_count = 0;

        while let Some(joined) = workers.join_next().await {
            match joined {
                Ok(PairOutcome::Success { lender_id, score }) => {
                    success_count += 1;
                    info!("Match completed: lender {lender_id} scored {score}");
                }
                Ok(PairOutcome::Failure { lender_id, error }) => {
                    failure_count += 1;
                    warn!("Match failed: lender {lender_id}: {error}");
                }
                Err(join_err) => {
                    failure_count += 1;
                    error!("Match worker panicked: {join_err}");
                }
            }
        }

        info!("Parallel matching completed: {success_count} succeeded, {failure_count} failed");
        (success_count, failure_count)
    }

    /// Phase 3: the application reaches `completed` regardless of per-pair
    /// outcomes; the per-pair detail stays queryable on the match rows.
    async fn finalize(
        &self,
        application_id: Uuid,
        lender_count: usize,
        success_count: usize,
        failure_count: usize,
    ) -> Result<RunSummary, AppError> {
        self.store
            .set_application_status(application_id, DocumentStatus::Completed)
            .await?;

        info!(
            "Matching finalized for application {application_id}. \
             Matches: {success_count} successful, {failure_count} failed"
        );

        Ok(RunSummary {
            application_id,
            lender_count,
            success_count,
            failure_count,
        })
    }
}

async fn score_pair(
    store: &dyn MatchStore,
    scorer: &dyn MatchScorer,
    application_id: Uuid,
    candidate: LenderCandidate,
) -> PairOutcome {
    let lender_id = candidate.id;
    match score_pair_inner(store, scorer, application_id, &candidate).await {
        Ok(score) => PairOutcome::Success { lender_id, score },
        Err(e) => {
            let error = e.to_string();
            if let Err(update_err) = store.fail_match(application_id, lender_id, &error).await {
                error!("Failed to update match status for lender {lender_id}: {update_err}");
            }
            PairOutcome::Failure { lender_id, error }
        }
    }
}

async fn score_pair_inner(
    store: &dyn MatchStore,
    scorer: &dyn MatchScorer,
    application_id: Uuid,
    candidate: &LenderCandidate,
) -> Result<f64, AppError> {
    store
        .mark_match_processing(application_id, candidate.id)
        .await?;

    let application_data = store.application_data(application_id).await?;

    let report = scorer
        .score(&application_data, &candidate.processed_data, &candidate.name)
        .await?;

    store
        .complete_match(
            application_id,
            candidate.id,
            report.match_score,
            report.match_analysis,
        )
        .await?;

    Ok(report.match_score)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::scoring::MatchReport;
    use crate::models::status::MatchStatus;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone)]
    struct MatchRecord {
        status: MatchStatus,
        score: Option<f64>,
        analysis: Option<Value>,
        error: Option<String>,
    }

    impl MatchRecord {
        fn pending() -> Self {
            Self {
                status: MatchStatus::Pending,
                score: None,
                analysis: None,
                error: None,
            }
        }
    }

    struct MemoryStore {
        lenders: Mutex<Vec<LenderCandidate>>,
        application_status: Mutex<DocumentStatus>,
        application_data: Value,
        matches: Mutex<BTreeMap<Uuid, MatchRecord>>,
    }

    impl MemoryStore {
        fn new(lenders: Vec<LenderCandidate>) -> Self {
            Self {
                lenders: Mutex::new(lenders),
                application_status: Mutex::new(DocumentStatus::Uploaded),
                application_data: json!({"loan_type": "home", "loan_amount": 250000}),
                matches: Mutex::new(BTreeMap::new()),
            }
        }

        fn add_lender(&self, lender: LenderCandidate) {
            self.lenders.lock().unwrap().push(lender);
        }

        fn application_status(&self) -> DocumentStatus {
            *self.application_status.lock().unwrap()
        }

        fn match_count(&self) -> usize {
            self.matches.lock().unwrap().len()
        }

        fn record(&self, lender_id: Uuid) -> MatchRecord {
            self.matches
                .lock()
                .unwrap()
                .get(&lender_id)
                .cloned()
                .expect("match record missing")
        }

        fn records(&self) -> Vec<MatchRecord> {
            self.matches.lock().unwrap().values().cloned().collect()
        }
    }

    #[async_trait]
    impl MatchStore for MemoryStore {
        async fn completed_lenders(&self) -> Result<Vec<LenderCandidate>, AppError> {
            Ok(self.lenders.lock().unwrap().clone())
        }

        async fn create_pending_matches(
            &self,
            _application_id: Uuid,
            lender_ids: &[Uuid],
        ) -> Result<u64, AppError> {
            let mut matches = self.matches.lock().unwrap();
            let mut created = 0;
            for lender_id in lender_ids {
                if !matches.contains_key(lender_id) {
                    matches.insert(*lender_id, MatchRecord::pending());
                    created += 1;
                }
            }
            Ok(created)
        }

        async fn pending_lender_ids(&self, _application_id: Uuid) -> Result<Vec<Uuid>, AppError> {
            Ok(self
                .matches
                .lock()
                .unwrap()
                .iter()
                .filter(|(_, r)| r.status == MatchStatus::Pending)
                .map(|(id, _)| *id)
                .collect())
        }

        async fn set_application_status(
            &self,
            _application_id: Uuid,
            status: DocumentStatus,
        ) -> Result<(), AppError> {
            *self.application_status.lock().unwrap() = status;
            Ok(())
        }

        async fn application_data(&self, _application_id: Uuid) -> Result<Value, AppError> {
            Ok(self.application_data.clone())
        }

        async fn mark_match_processing(
            &self,
            _application_id: Uuid,
            lender_id: Uuid,
        ) -> Result<(), AppError> {
            self.matches
                .lock()
                .unwrap()
                .get_mut(&lender_id)
                .expect("match record missing")
                .status = MatchStatus::Processing;
            Ok(())
        }

        async fn complete_match(
            &self,
            _application_id: Uuid,
            lender_id: Uuid,
            score: f64,
            analysis: Value,
        ) -> Result<(), AppError> {
            let mut matches = self.matches.lock().unwrap();
            let record = matches.get_mut(&lender_id).expect("match record missing");
            record.status = MatchStatus::Completed;
            record.score = Some(score);
            record.analysis = Some(analysis);
            record.error = None;
            Ok(())
        }

        async fn fail_match(
            &self,
            _application_id: Uuid,
            lender_id: Uuid,
            error: &str,
        ) -> Result<(), AppError> {
            let mut matches = self.matches.lock().unwrap();
            let record = matches.get_mut(&lender_id).expect("match record missing");
            record.status = MatchStatus::Failed;
            record.score = None;
            record.analysis = None;
            record.error = Some(error.to_string());
            Ok(())
        }

        async fn fail_unresolved_matches(
            &self,
            _application_id: Uuid,
            error: &str,
        ) -> Result<u64, AppError> {
            let mut swept = 0;
            for record in self.matches.lock().unwrap().values_mut() {
                if !record.status.is_terminal() {
                    record.status = MatchStatus::Failed;
                    record.score = None;
                    record.analysis = None;
                    record.error = Some(error.to_string());
                    swept += 1;
                }
            }
            Ok(swept)
        }

        async fn match_status_counts(
            &self,
            _application_id: Uuid,
            lender_ids: &[Uuid],
        ) -> Result<(u64, u64), AppError> {
            let matches = self.matches.lock().unwrap();
            let completed = matches
                .iter()
                .filter(|(id, r)| lender_ids.contains(id) && r.status == MatchStatus::Completed)
                .count() as u64;
            let failed = matches
                .iter()
                .filter(|(id, r)| lender_ids.contains(id) && r.status == MatchStatus::Failed)
                .count() as u64;
            Ok((completed, failed))
        }
    }

    /// Scores by lender name: `Ok(score)` completes the pair, `Err` fails it.
    struct ScriptedScorer {
        outcomes: BTreeMap<String, Result<f64, String>>,
    }

    #[async_trait]
    impl MatchScorer for ScriptedScorer {
        async fn score(
            &self,
            _application_data: &Value,
            _lender_data: &Value,
            lender_name: &str,
        ) -> Result<MatchReport, AppError> {
            match self.outcomes.get(lender_name) {
                Some(Ok(score)) => Ok(MatchReport {
                    match_score: *score,
                    match_analysis: json!({"match_score": score}),
                }),
                Some(Err(message)) => Err(AppError::Llm(message.clone())),
                None => panic!("unexpected lender: {lender_name}"),
            }
        }
    }

    /// Never resolves within the dispatch budget.
    struct StalledScorer;

    #[async_trait]
    impl MatchScorer for StalledScorer {
        async fn score(
            &self,
            _application_data: &Value,
            _lender_data: &Value,
            _lender_name: &str,
        ) -> Result<MatchReport, AppError> {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            unreachable!("scorer should have been cancelled by the dispatch timeout")
        }
    }

    /// Asserts the full candidate set was materialized before any scoring.
    struct SnapshotAssertingScorer {
        store: Arc<MemoryStore>,
        expected: usize,
    }

    #[async_trait]
    impl MatchScorer for SnapshotAssertingScorer {
        async fn score(
            &self,
            _application_data: &Value,
            _lender_data: &Value,
            _lender_name: &str,
        ) -> Result<MatchReport, AppError> {
            assert_eq!(
                self.store.match_count(),
                self.expected,
                "dispatch started before all match records were created"
            );
            Ok(MatchReport {
                match_score: 50.0,
                match_analysis: json!({"match_score": 50.0}),
            })
        }
    }

    /// Succeeds with a fixed score and records how many pairs reached it.
    struct CountingScorer {
        score: f64,
        calls: Mutex<usize>,
    }

    #[async_trait]
    impl MatchScorer for CountingScorer {
        async fn score(
            &self,
            _application_data: &Value,
            _lender_data: &Value,
            _lender_name: &str,
        ) -> Result<MatchReport, AppError> {
            *self.calls.lock().unwrap() += 1;
            Ok(MatchReport {
                match_score: self.score,
                match_analysis: json!({"match_score": self.score}),
            })
        }
    }

    fn candidate(name: &str) -> LenderCandidate {
        LenderCandidate {
            id: Uuid::new_v4(),
            name: name.to_string(),
            processed_data: json!({"loan_types": ["home"]}),
        }
    }

    fn orchestrator(
        store: Arc<MemoryStore>,
        scorer: Arc<dyn MatchScorer>,
    ) -> MatchingOrchestrator {
        MatchingOrchestrator::new(store, scorer)
    }

    #[tokio::test]
    async fn test_zero_completed_lenders_short_circuits() {
        let store = Arc::new(MemoryStore::new(vec![]));
        let scorer = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::new(),
        });
        let application_id = Uuid::new_v4();

        let summary = orchestrator(store.clone(), scorer)
            .run(application_id)
            .await
            .unwrap();

        assert_eq!(summary.lender_count, 0);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 0);
        assert!(!summary.all_failed());
        assert_eq!(store.match_count(), 0);
        assert_eq!(store.application_status(), DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_all_pairs_reach_terminal_status() {
        let lenders = vec![candidate("Acme Bank"), candidate("Birch Credit"), candidate("Cedar Loans")];
        let ids: Vec<Uuid> = lenders.iter().map(|l| l.id).collect();
        let store = Arc::new(MemoryStore::new(lenders));
        let scorer = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([
                ("Acme Bank".to_string(), Ok(92.0)),
                ("Birch Credit".to_string(), Ok(61.0)),
                ("Cedar Loans".to_string(), Err("LLM error: rate limited".to_string())),
            ]),
        });
        let application_id = Uuid::new_v4();

        let summary = orchestrator(store.clone(), scorer)
            .run(application_id)
            .await
            .unwrap();

        assert_eq!(summary.lender_count, 3);
        assert_eq!(summary.success_count, 2);
        assert_eq!(summary.failure_count, 1);
        assert_eq!(store.match_count(), 3);
        assert_eq!(store.application_status(), DocumentStatus::Completed);
        for record in store.records() {
            assert!(record.status.is_terminal(), "non-terminal match after finalize");
        }
        assert_eq!(store.record(ids[0]).score, Some(92.0));
        assert_eq!(store.record(ids[1]).score, Some(61.0));
    }

    #[tokio::test]
    async fn test_failing_pair_does_not_affect_siblings() {
        let lenders = vec![candidate("Good Lender"), candidate("Bad Lender")];
        let (good_id, bad_id) = (lenders[0].id, lenders[1].id);
        let store = Arc::new(MemoryStore::new(lenders));
        let scorer = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([
                ("Good Lender".to_string(), Ok(75.0)),
                ("Bad Lender".to_string(), Err("connection reset".to_string())),
            ]),
        });

        orchestrator(store.clone(), scorer)
            .run(Uuid::new_v4())
            .await
            .unwrap();

        let good = store.record(good_id);
        assert_eq!(good.status, MatchStatus::Completed);
        assert_eq!(good.score, Some(75.0));
        assert!(good.analysis.is_some());
        assert!(good.error.is_none());

        let bad = store.record(bad_id);
        assert_eq!(bad.status, MatchStatus::Failed);
        assert!(bad.score.is_none());
        assert!(bad.error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test]
    async fn test_score_is_set_iff_match_completed() {
        let lenders = vec![candidate("A"), candidate("B")];
        let store = Arc::new(MemoryStore::new(lenders));
        let scorer = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([
                ("A".to_string(), Ok(88.0)),
                ("B".to_string(), Err("boom".to_string())),
            ]),
        });

        orchestrator(store.clone(), scorer)
            .run(Uuid::new_v4())
            .await
            .unwrap();

        for record in store.records() {
            assert_eq!(record.score.is_some(), record.status == MatchStatus::Completed);
        }
    }

    #[tokio::test]
    async fn test_rerun_creates_no_duplicate_matches() {
        let lenders = vec![candidate("A"), candidate("B")];
        let store = Arc::new(MemoryStore::new(lenders));
        let scorer = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([
                ("A".to_string(), Ok(80.0)),
                ("B".to_string(), Ok(70.0)),
            ]),
        });
        let application_id = Uuid::new_v4();
        let orchestrator = orchestrator(store.clone(), scorer);

        orchestrator.run(application_id).await.unwrap();
        orchestrator.run(application_id).await.unwrap();

        assert_eq!(store.match_count(), 2);
    }

    #[tokio::test]
    async fn test_all_failed_signal_with_completed_status() {
        let lenders = vec![candidate("A"), candidate("B")];
        let store = Arc::new(MemoryStore::new(lenders));
        let scorer = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([
                ("A".to_string(), Err("boom".to_string())),
                ("B".to_string(), Err("boom".to_string())),
            ]),
        });

        let summary = orchestrator(store.clone(), scorer)
            .run(Uuid::new_v4())
            .await
            .unwrap();

        assert!(summary.all_failed());
        // COMPLETED means "matching finished", even when every pair failed.
        assert_eq!(store.application_status(), DocumentStatus::Completed);
    }

    #[tokio::test]
    async fn test_candidate_set_is_durable_before_dispatch() {
        let lenders = vec![candidate("A"), candidate("B"), candidate("C")];
        let store = Arc::new(MemoryStore::new(lenders));
        let scorer = Arc::new(SnapshotAssertingScorer {
            store: store.clone(),
            expected: 3,
        });

        let summary = orchestrator(store, scorer).run(Uuid::new_v4()).await.unwrap();
        assert_eq!(summary.success_count, 3);
    }

    #[tokio::test]
    async fn test_failed_match_clears_score_and_analysis() {
        let store = MemoryStore::new(vec![]);
        let application_id = Uuid::new_v4();
        let lender_id = Uuid::new_v4();

        store
            .create_pending_matches(application_id, &[lender_id])
            .await
            .unwrap();
        store
            .complete_match(application_id, lender_id, 82.0, json!({"match_score": 82.0}))
            .await
            .unwrap();
        store
            .fail_match(application_id, lender_id, "scoring failed")
            .await
            .unwrap();

        let record = store.record(lender_id);
        assert_eq!(record.status, MatchStatus::Failed);
        assert!(record.score.is_none(), "failed match row still carries a score");
        assert!(record.analysis.is_none());
    }

    #[tokio::test]
    async fn test_rerun_dispatches_only_unresolved_pairs() {
        let lenders = vec![candidate("Acme Bank"), candidate("Birch Credit")];
        let (acme_id, birch_id) = (lenders[0].id, lenders[1].id);
        let store = Arc::new(MemoryStore::new(lenders));
        let application_id = Uuid::new_v4();

        let first = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([
                ("Acme Bank".to_string(), Ok(90.0)),
                ("Birch Credit".to_string(), Err("rate limited".to_string())),
            ]),
        });
        orchestrator(store.clone(), first)
            .run(application_id)
            .await
            .unwrap();

        let second = Arc::new(CountingScorer {
            score: 10.0,
            calls: Mutex::new(0),
        });
        let summary = orchestrator(store.clone(), second.clone())
            .run(application_id)
            .await
            .unwrap();

        assert_eq!(*second.calls.lock().unwrap(), 0, "terminal matches were re-scored");
        assert_eq!(summary.lender_count, 0);
        assert_eq!(store.record(acme_id).score, Some(90.0));
        assert_eq!(store.record(birch_id).status, MatchStatus::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_summary_counts_only_this_runs_pairs() {
        let store = Arc::new(MemoryStore::new(vec![candidate("Fast Lender")]));
        let application_id = Uuid::new_v4();

        let first = Arc::new(ScriptedScorer {
            outcomes: BTreeMap::from([("Fast Lender".to_string(), Ok(88.0))]),
        });
        orchestrator(store.clone(), first)
            .run(application_id)
            .await
            .unwrap();

        store.add_lender(candidate("Slow Lender"));
        let summary = orchestrator(store.clone(), Arc::new(StalledScorer))
            .run(application_id)
            .await
            .unwrap();

        // The first run's completed pair must not leak into this summary.
        assert_eq!(summary.lender_count, 1);
        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 1);
        assert!(summary.all_failed());
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispatch_timeout_sweeps_stragglers_to_failed() {
        let lenders = vec![candidate("Slow A"), candidate("Slow B")];
        let store = Arc::new(MemoryStore::new(lenders));

        let summary = orchestrator(store.clone(), Arc::new(StalledScorer))
            .run(Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(summary.success_count, 0);
        assert_eq!(summary.failure_count, 2);
        assert_eq!(store.application_status(), DocumentStatus::Completed);
        for record in store.records() {
            assert_eq!(record.status, MatchStatus::Failed);
            assert_eq!(record.error.as_deref(), Some(TIMEOUT_ERROR));
        }
    }
}
