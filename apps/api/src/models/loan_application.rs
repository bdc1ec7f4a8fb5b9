use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::status::{DocumentStatus, MatchStatus};

/// One uploaded loan application: applicant contact fields, raw OCR text and
/// the LLM-extracted profile. Owns zero-or-more `loan_matches` rows, deleted
/// by cascade with the application.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoanApplicationRow {
    pub id: Uuid,
    pub applicant_name: String,
    pub applicant_email: Option<String>,
    pub applicant_phone: Option<String>,
    pub application_details: Option<Value>,
    #[serde(skip_serializing)]
    pub raw_data: Option<String>,
    pub processed_data: Option<Value>,
    pub status: DocumentStatus,
    /// Correlates the application to its matching run (set by the trigger).
    pub workflow_run_id: Option<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub original_filename: Option<String>,
}

/// One scored (application, lender) pairing.
///
/// Invariant: `match_score` is non-null iff `status == completed`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoanMatchRow {
    pub id: Uuid,
    pub loan_application_id: Uuid,
    pub lender_id: Uuid,
    pub match_score: Option<f64>,
    pub match_analysis: Option<Value>,
    pub status: MatchStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A match row joined with the lender's display name, as returned by the
/// matches endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LoanMatchView {
    pub id: Uuid,
    pub lender_id: Uuid,
    pub lender_name: String,
    pub match_score: Option<f64>,
    pub match_analysis: Option<Value>,
    pub status: MatchStatus,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
