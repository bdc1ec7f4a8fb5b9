//! Persistence seam for the matching orchestrator.
//!
//! The orchestrator never touches `PgPool` directly: everything it needs from
//! the relational store goes through `MatchStore`, so the pipeline is
//! testable against an in-memory fake. Each method is its own transactional
//! unit; one pair's write cannot block or corrupt another's.

use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::status::{DocumentStatus, MatchStatus};

/// A lender eligible for matching: snapshot taken at prepare time, carried
/// through dispatch so workers do not re-read lender rows.
#[derive(Debug, Clone)]
pub struct LenderCandidate {
    pub id: Uuid,
    pub name: String,
    pub processed_data: Value,
}

#[async_trait]
pub trait MatchStore: Send + Sync {
    /// All lenders in `completed` status — the only match candidates.
    async fn completed_lenders(&self) -> Result<Vec<LenderCandidate>, AppError>;

    /// Inserts one `pending` match row per lender. Idempotent: a row that
    /// already exists for the (application, lender) pair is skipped, so an
    /// at-least-once re-run never duplicates matches. Returns the number of
    /// rows actually created.
    async fn create_pending_matches(
        &self,
        application_id: Uuid,
        lender_ids: &[Uuid],
    ) -> Result<u64, AppError>;

    /// Lender ids whose match row for the application is still `pending`.
    /// A re-run dispatches only these; terminal rows are never re-scored.
    async fn pending_lender_ids(&self, application_id: Uuid) -> Result<Vec<Uuid>, AppError>;

    async fn set_application_status(
        &self,
        application_id: Uuid,
        status: DocumentStatus,
    ) -> Result<(), AppError>;

    /// The application's processed profile, or an empty object when
    /// extraction has not populated it. `NotFound` when the application row
    /// is gone (aborts that pair only).
    async fn application_data(&self, application_id: Uuid) -> Result<Value, AppError>;

    async fn mark_match_processing(
        &self,
        application_id: Uuid,
        lender_id: Uuid,
    ) -> Result<(), AppError>;

    async fn complete_match(
        &self,
        application_id: Uuid,
        lender_id: Uuid,
        score: f64,
        analysis: Value,
    ) -> Result<(), AppError>;

    /// Fails the pair and clears any stored score/analysis, preserving the
    /// invariant that `match_score` is non-null iff `status == completed`.
    async fn fail_match(
        &self,
        application_id: Uuid,
        lender_id: Uuid,
        error: &str,
    ) -> Result<(), AppError>;

    /// Timeout sweep: every still-`pending`/`processing` match for the
    /// application becomes `failed` with the given message. Returns the
    /// number of rows swept.
    async fn fail_unresolved_matches(
        &self,
        application_id: Uuid,
        error: &str,
    ) -> Result<u64, AppError>;

    /// (completed, failed) counts over the given pairs of the application,
    /// so a run reports only its own candidate set.
    async fn match_status_counts(
        &self,
        application_id: Uuid,
        lender_ids: &[Uuid],
    ) -> Result<(u64, u64), AppError>;
}

pub struct PgMatchStore {
    pool: PgPool,
}

impl PgMatchStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MatchStore for PgMatchStore {
    async fn completed_lenders(&self) -> Result<Vec<LenderCandidate>, AppError> {
        let rows: Vec<(Uuid, String, Option<Value>)> = sqlx::query_as(
            "SELECT id, lender_name, processed_data FROM lenders WHERE status = $1",
        )
        .bind(DocumentStatus::Completed)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, name, processed_data)| LenderCandidate {
                id,
                name,
                processed_data: processed_data.unwrap_or_else(|| json!({})),
            })
            .collect())
    }

    async fn create_pending_matches(
        &self,
        application_id: Uuid,
        lender_ids: &[Uuid],
    ) -> Result<u64, AppError> {
        let mut created = 0u64;
        for lender_id in lender_ids {
            let result = sqlx::query(
                "INSERT INTO loan_matches (loan_application_id, lender_id, status) \
                 VALUES ($1, $2, $3) \
                 ON CONFLICT (loan_application_id, lender_id) DO NOTHING",
            )
            .bind(application_id)
            .bind(lender_id)
            .bind(MatchStatus::Pending)
            .execute(&self.pool)
            .await?;
            created += result.rows_affected();
        }
        Ok(created)
    }

    async fn pending_lender_ids(&self, application_id: Uuid) -> Result<Vec<Uuid>, AppError> {
        let rows: Vec<(Uuid,)> = sqlx::query_as(
            "SELECT lender_id FROM loan_matches \
             WHERE loan_application_id = $1 AND status = $2",
        )
        .bind(application_id)
        .bind(MatchStatus::Pending)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn set_application_status(
        &self,
        application_id: Uuid,
        status: DocumentStatus,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE loan_applications SET status = $2, updated_at = now() WHERE id = $1")
            .bind(application_id)
            .bind(status)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn application_data(&self, application_id: Uuid) -> Result<Value, AppError> {
        let row: Option<(Option<Value>,)> =
            sqlx::query_as("SELECT processed_data FROM loan_applications WHERE id = $1")
                .bind(application_id)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some((data,)) => Ok(data.unwrap_or_else(|| json!({}))),
            None => Err(AppError::NotFound(format!(
                "Loan application {application_id} not found"
            ))),
        }
    }

    async fn mark_match_processing(
        &self,
        application_id: Uuid,
        lender_id: Uuid,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE loan_matches SET status = $3, updated_at = now() \
             WHERE loan_application_id = $1 AND lender_id = $2",
        )
        .bind(application_id)
        .bind(lender_id)
        .bind(MatchStatus::Processing)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn complete_match(
        &self,
        application_id: Uuid,
        lender_id: Uuid,
        score: f64,
        analysis: Value,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE loan_matches \
             SET match_score = $3, match_analysis = $4, status = $5, error_message = NULL, \
                 updated_at = now() \
             WHERE loan_application_id = $1 AND lender_id = $2",
        )
        .bind(application_id)
        .bind(lender_id)
        .bind(score)
        .bind(analysis)
        .bind(MatchStatus::Completed)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_match(
        &self,
        application_id: Uuid,
        lender_id: Uuid,
        error: &str,
    ) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE loan_matches \
             SET status = $3, error_message = $4, match_score = NULL, match_analysis = NULL, \
                 updated_at = now() \
             WHERE loan_application_id = $1 AND lender_id = $2",
        )
        .bind(application_id)
        .bind(lender_id)
        .bind(MatchStatus::Failed)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn fail_unresolved_matches(
        &self,
        application_id: Uuid,
        error: &str,
    ) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE loan_matches \
             SET status = $2, error_message = $3, match_score = NULL, match_analysis = NULL, \
                 updated_at = now() \
             WHERE loan_application_id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(application_id)
        .bind(MatchStatus::Failed)
        .bind(error)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn match_status_counts(
        &self,
        application_id: Uuid,
        lender_ids: &[Uuid],
    ) -> Result<(u64, u64), AppError> {
        let (completed, failed): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*) FILTER (WHERE status = 'completed'), \
                    COUNT(*) FILTER (WHERE status = 'failed') \
             FROM loan_matches \
             WHERE loan_application_id = $1 AND lender_id = ANY($2)",
        )
        .bind(application_id)
        .bind(lender_ids)
        .fetch_one(&self.pool)
        .await?;
        Ok((completed as u64, failed as u64))
    }
}
