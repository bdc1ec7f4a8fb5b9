//! Axum route handlers for loan applications: upload, fetch (with matches),
//! list, match queries, delete.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::loan_application::{LoanApplicationRow, LoanMatchView};
use crate::models::status::{DocumentStatus, MatchStatus};
use crate::ocr::extract_document_text;
use crate::routes::lenders::parse_status_filter;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadApplicationResponse {
    pub message: String,
    pub application_id: Uuid,
    pub status: DocumentStatus,
    pub workflow_run_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationResponse {
    #[serde(flatten)]
    pub application: LoanApplicationRow,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matches: Option<Vec<LoanMatchView>>,
}

#[derive(Debug, Serialize)]
pub struct ApplicationListResponse {
    pub total: i64,
    pub applications: Vec<LoanApplicationRow>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub status_filter: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub offset: i64,
}

fn default_limit() -> i64 {
    100
}

#[derive(Debug, Deserialize)]
pub struct GetApplicationQuery {
    #[serde(default = "default_true")]
    pub include_matches: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct MatchesQuery {
    pub status_filter: Option<String>,
    pub min_score: Option<f64>,
}

struct ApplicationUploadForm {
    filename: String,
    content: Bytes,
    applicant_name: String,
    applicant_email: Option<String>,
    applicant_phone: Option<String>,
    application_details: Option<Value>,
    created_by: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<ApplicationUploadForm, AppError> {
    let mut filename = String::new();
    let mut content: Option<Bytes> = None;
    let mut applicant_name: Option<String> = None;
    let mut applicant_email: Option<String> = None;
    let mut applicant_phone: Option<String> = None;
    let mut application_details: Option<Value> = None;
    let mut created_by: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                filename = field.file_name().unwrap_or_default().to_string();
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?,
                );
            }
            "application_details" => {
                let raw = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read application_details: {e}"))
                })?;
                match serde_json::from_str::<Value>(&raw) {
                    Ok(parsed) => application_details = Some(parsed),
                    Err(_) => warn!("Invalid JSON in application_details, ignoring"),
                }
            }
            "applicant_name" | "applicant_email" | "applicant_phone" | "created_by" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read {name}: {e}")))?;
                match name.as_str() {
                    "applicant_name" => applicant_name = Some(text),
                    "applicant_email" => applicant_email = Some(text),
                    "applicant_phone" => applicant_phone = Some(text),
                    _ => created_by = Some(text),
                }
            }
            _ => {}
        }
    }

    let content =
        content.ok_or_else(|| AppError::Validation("file field is required".to_string()))?;
    let applicant_name = applicant_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::Validation("applicant_name is required".to_string()))?;

    Ok(ApplicationUploadForm {
        filename,
        content,
        applicant_name,
        applicant_email,
        applicant_phone,
        application_details,
        created_by,
    })
}

/// POST /api/loan-applications/upload
pub async fn upload_application(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadApplicationResponse>), AppError> {
    let form = read_upload_form(multipart).await?;
    info!(
        "Received loan application upload request for applicant: {}",
        form.applicant_name
    );

    let raw_text = extract_document_text(state.extractor.as_ref(), &form.filename, &form.content)?;

    let application_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO loan_applications \
         (id, applicant_name, applicant_email, applicant_phone, application_details, \
          raw_data, status, created_by, original_filename) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(application_id)
    .bind(&form.applicant_name)
    .bind(&form.applicant_email)
    .bind(&form.applicant_phone)
    .bind(&form.application_details)
    .bind(&raw_text)
    .bind(DocumentStatus::Uploaded)
    .bind(&form.created_by)
    .bind(&form.filename)
    .execute(&state.db)
    .await?;

    info!("Created loan application record with ID: {application_id}");

    // Fire-and-forget: trigger failure is logged by the trigger itself and
    // never fails the upload response.
    let workflow_run_id = state
        .workflows
        .trigger_application_matching(application_id)
        .await;

    if let Some(run_id) = &workflow_run_id {
        record_workflow_run_id(&state.db, application_id, run_id).await;
    }

    Ok((
        StatusCode::CREATED,
        Json(UploadApplicationResponse {
            message: "Loan application uploaded successfully. Matching process started."
                .to_string(),
            application_id,
            status: DocumentStatus::Uploaded,
            workflow_run_id,
        }),
    ))
}

/// Best-effort bookkeeping. The upload and trigger already succeeded, so a
/// failure to store the run id is logged rather than failing the response.
async fn record_workflow_run_id(db: &sqlx::PgPool, application_id: Uuid, run_id: &str) {
    if let Err(e) = sqlx::query("UPDATE loan_applications SET workflow_run_id = $2 WHERE id = $1")
        .bind(application_id)
        .bind(run_id)
        .execute(db)
        .await
    {
        warn!("Failed to record workflow run id for application {application_id}: {e}");
    }
}

/// GET /api/loan-applications/:id
pub async fn get_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Query(params): Query<GetApplicationQuery>,
) -> Result<Json<ApplicationResponse>, AppError> {
    let application: Option<LoanApplicationRow> =
        sqlx::query_as("SELECT * FROM loan_applications WHERE id = $1")
            .bind(application_id)
            .fetch_optional(&state.db)
            .await?;

    let application = application.ok_or_else(|| {
        AppError::NotFound(format!(
            "Loan application with ID {application_id} not found"
        ))
    })?;

    let matches = if params.include_matches {
        let rows: Vec<LoanMatchView> = sqlx::query_as(
            "SELECT m.id, m.lender_id, l.lender_name, m.match_score, m.match_analysis, \
                    m.status, m.error_message, m.created_at, m.updated_at \
             FROM loan_matches m JOIN lenders l ON l.id = m.lender_id \
             WHERE m.loan_application_id = $1 \
             ORDER BY m.match_score DESC NULLS LAST",
        )
        .bind(application_id)
        .fetch_all(&state.db)
        .await?;
        Some(rows)
    } else {
        None
    };

    Ok(Json(ApplicationResponse {
        application,
        matches,
    }))
}

/// GET /api/loan-applications/
pub async fn list_applications(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<ApplicationListResponse>, AppError> {
    let status = parse_status_filter(params.status_filter.as_deref())?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM loan_applications \
         WHERE ($1::document_status IS NULL OR status = $1)",
    )
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    let applications: Vec<LoanApplicationRow> = sqlx::query_as(
        "SELECT * FROM loan_applications \
         WHERE ($1::document_status IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(status)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(ApplicationListResponse {
        total,
        applications,
    }))
}

/// GET /api/loan-applications/:id/matches
pub async fn get_application_matches(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
    Query(params): Query<MatchesQuery>,
) -> Result<Json<Vec<LoanMatchView>>, AppError> {
    let status = params
        .status_filter
        .as_deref()
        .map(|s| {
            s.parse::<MatchStatus>()
                .map_err(|e| AppError::Validation(e.to_string()))
        })
        .transpose()?;

    let exists: Option<(Uuid,)> = sqlx::query_as("SELECT id FROM loan_applications WHERE id = $1")
        .bind(application_id)
        .fetch_optional(&state.db)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound(format!(
            "Loan application with ID {application_id} not found"
        )));
    }

    let matches: Vec<LoanMatchView> = sqlx::query_as(
        "SELECT m.id, m.lender_id, l.lender_name, m.match_score, m.match_analysis, \
                m.status, m.error_message, m.created_at, m.updated_at \
         FROM loan_matches m JOIN lenders l ON l.id = m.lender_id \
         WHERE m.loan_application_id = $1 \
           AND ($2::match_status IS NULL OR m.status = $2) \
           AND ($3::float8 IS NULL OR m.match_score >= $3) \
         ORDER BY m.match_score DESC NULLS LAST",
    )
    .bind(application_id)
    .bind(status)
    .bind(params.min_score)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(matches))
}

/// DELETE /api/loan-applications/:id
pub async fn delete_application(
    State(state): State<AppState>,
    Path(application_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    // Match rows go with the application via ON DELETE CASCADE; lender rows
    // are untouched.
    let result = sqlx::query("DELETE FROM loan_applications WHERE id = $1")
        .bind(application_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Loan application with ID {application_id} not found"
        )));
    }

    info!("Deleted loan application {application_id}");
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_id_bookkeeping_failure_does_not_propagate() {
        // Nothing listens on port 1, so the UPDATE fails; the helper must
        // swallow the error instead of surfacing a 500 for a finished upload.
        let db = sqlx::postgres::PgPoolOptions::new()
            .acquire_timeout(std::time::Duration::from_millis(200))
            .connect_lazy("postgres://127.0.0.1:1/loanmatch_test")
            .expect("lazy pool");
        record_workflow_run_id(&db, Uuid::new_v4(), "run-1").await;
    }
}
