//! Axum route handlers for lender documents: upload, fetch, list, delete.

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
use crate::models::lender::LenderRow;
use crate::models::status::DocumentStatus;
use crate::ocr::extract_document_text;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadLenderResponse {
    pub message: String,
    pub lender_id: Uuid,
    pub status: DocumentStatus,
    pub workflow_run_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct LenderListResponse {
    pub total: i64,
    pub lenders: Vec<LenderRow>,
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

struct LenderUploadForm {
    filename: String,
    content: Bytes,
    lender_name: String,
    policy_details: Option<Value>,
    created_by: Option<String>,
}

async fn read_upload_form(mut multipart: Multipart) -> Result<LenderUploadForm, AppError> {
    let mut filename = String::new();
    let mut content: Option<Bytes> = None;
    let mut lender_name: Option<String> = None;
    let mut policy_details: Option<Value> = None;
    let mut created_by: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Invalid multipart payload: {e}")))?
    {
        match field.name() {
            Some("file") => {
                filename = field.file_name().unwrap_or_default().to_string();
                content = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(format!("Failed to read file: {e}")))?,
                );
            }
            Some("lender_name") => {
                lender_name = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read lender_name: {e}"))
                })?);
            }
            Some("policy_details") => {
                let raw = field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read policy_details: {e}"))
                })?;
                match serde_json::from_str::<Value>(&raw) {
                    Ok(parsed) => policy_details = Some(parsed),
                    Err(_) => warn!("Invalid JSON in policy_details, ignoring"),
                }
            }
            Some("created_by") => {
                created_by = Some(field.text().await.map_err(|e| {
                    AppError::Validation(format!("Failed to read created_by: {e}"))
                })?);
            }
            _ => {}
        }
    }

    let content =
        content.ok_or_else(|| AppError::Validation("file field is required".to_string()))?;
    let lender_name = lender_name
        .filter(|n| !n.trim().is_empty())
        .ok_or_else(|| AppError::Validation("lender_name is required".to_string()))?;

    Ok(LenderUploadForm {
        filename,
        content,
        lender_name,
        policy_details,
        created_by,
    })
}

/// POST /api/lenders/upload
pub async fn upload_lender(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<UploadLenderResponse>), AppError> {
    let form = read_upload_form(multipart).await?;
    info!("Received PDF upload request for lender: {}", form.lender_name);

    let raw_text = extract_document_text(state.extractor.as_ref(), &form.filename, &form.content)?;

    let lender_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO lenders \
         (id, lender_name, policy_details, raw_data, status, created_by, original_filename) \
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(lender_id)
    .bind(&form.lender_name)
    .bind(&form.policy_details)
    .bind(&raw_text)
    .bind(DocumentStatus::Uploaded)
    .bind(&form.created_by)
    .bind(&form.filename)
    .execute(&state.db)
    .await?;

    info!("Created lender record with ID: {lender_id}");

    let workflow_run_id = state.workflows.trigger_lender_processing(lender_id).await;

    Ok((
        StatusCode::CREATED,
        Json(UploadLenderResponse {
            message: "PDF uploaded successfully. Processing started.".to_string(),
            lender_id,
            status: DocumentStatus::Uploaded,
            workflow_run_id,
        }),
    ))
}

/// GET /api/lenders/:id
pub async fn get_lender(
    State(state): State<AppState>,
    Path(lender_id): Path<Uuid>,
) -> Result<Json<LenderRow>, AppError> {
    let lender: Option<LenderRow> = sqlx::query_as("SELECT * FROM lenders WHERE id = $1")
        .bind(lender_id)
        .fetch_optional(&state.db)
        .await?;

    lender
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("Lender with ID {lender_id} not found")))
}

/// GET /api/lenders/
pub async fn list_lenders(
    State(state): State<AppState>,
    Query(params): Query<ListQuery>,
) -> Result<Json<LenderListResponse>, AppError> {
    let status = parse_status_filter(params.status_filter.as_deref())?;

    let (total,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM lenders WHERE ($1::document_status IS NULL OR status = $1)",
    )
    .bind(status)
    .fetch_one(&state.db)
    .await?;

    let lenders: Vec<LenderRow> = sqlx::query_as(
        "SELECT * FROM lenders WHERE ($1::document_status IS NULL OR status = $1) \
         ORDER BY created_at DESC LIMIT $2 OFFSET $3",
    )
    .bind(status)
    .bind(params.limit)
    .bind(params.offset)
    .fetch_all(&state.db)
    .await?;

    Ok(Json(LenderListResponse { total, lenders }))
}

/// DELETE /api/lenders/:id
pub async fn delete_lender(
    State(state): State<AppState>,
    Path(lender_id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    let result = sqlx::query("DELETE FROM lenders WHERE id = $1")
        .bind(lender_id)
        .execute(&state.db)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound(format!(
            "Lender with ID {lender_id} not found"
        )));
    }

    info!("Deleted lender {lender_id}");
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) fn parse_status_filter(
    filter: Option<&str>,
) -> Result<Option<DocumentStatus>, AppError> {
    filter
        .map(|s| {
            s.parse::<DocumentStatus>()
                .map_err(|e| AppError::Validation(e.to_string()))
        })
        .transpose()
}
