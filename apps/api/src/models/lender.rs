use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::status::DocumentStatus;

/// One lender policy document: raw OCR text plus the LLM-extracted terms.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LenderRow {
    pub id: Uuid,
    pub lender_name: String,
    pub policy_details: Option<Value>,
    #[serde(skip_serializing)]
    pub raw_data: Option<String>,
    pub processed_data: Option<Value>,
    pub status: DocumentStatus,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub original_filename: Option<String>,
}
