//! Per-entity extraction routines run from the background pipeline.
//!
//! Errors here are converted into a `failed` status on the record rather than
//! propagating: the upload already succeeded, so the only user-visible
//! failure channel is the status field the client polls.

use sqlx::PgPool;
use tracing::{error, info};
use uuid::Uuid;

use crate::errors::AppError;
use crate::extraction::completeness::enrich_with_validation;
use crate::extraction::{process_application_document, process_lender_document};
use crate::llm_client::LlmClient;
use crate::models::status::DocumentStatus;

/// Runs structured extraction for a lender: uploaded → processing →
/// completed|failed. Returns the error that caused a `failed` transition so
/// the spawning task can log it.
pub async fn run_lender_extraction(
    pool: &PgPool,
    llm: &LlmClient,
    lender_id: Uuid,
) -> Result<(), AppError> {
    let row: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT lender_name, raw_data FROM lenders WHERE id = $1")
            .bind(lender_id)
            .fetch_optional(pool)
            .await?;

    let Some((lender_name, raw_data)) = row else {
        return Err(AppError::NotFound(format!("Lender {lender_id} not found")));
    };

    set_lender_status(pool, lender_id, DocumentStatus::Processing).await?;
    info!("Processing lender: {lender_name}");

    let outcome = async {
        let raw_text = raw_data
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation("No raw data available".to_string()))?;
        let data = process_lender_document(llm, &raw_text, &lender_name).await?;
        Ok::<_, AppError>(enrich_with_validation(data))
    }
    .await;

    match outcome {
        Ok(data) => {
            sqlx::query(
                "UPDATE lenders SET processed_data = $2, status = $3, updated_at = now() WHERE id = $1",
            )
            .bind(lender_id)
            .bind(data)
            .bind(DocumentStatus::Completed)
            .execute(pool)
            .await?;
            info!("Lender {lender_id} extraction completed");
            Ok(())
        }
        Err(e) => {
            error!("Lender {lender_id} extraction failed: {e}");
            if let Err(update_err) =
                set_lender_status(pool, lender_id, DocumentStatus::Failed).await
            {
                error!("Failed to mark lender {lender_id} as failed: {update_err}");
            }
            Err(e)
        }
    }
}

/// Runs structured extraction for a loan application. Same state walk as the
/// lender routine; the matching run only proceeds when this succeeds.
pub async fn run_application_extraction(
    pool: &PgPool,
    llm: &LlmClient,
    application_id: Uuid,
) -> Result<(), AppError> {
    let row: Option<(String, Option<String>)> =
        sqlx::query_as("SELECT applicant_name, raw_data FROM loan_applications WHERE id = $1")
            .bind(application_id)
            .fetch_optional(pool)
            .await?;

    let Some((applicant_name, raw_data)) = row else {
        return Err(AppError::NotFound(format!(
            "Loan application {application_id} not found"
        )));
    };

    set_application_status(pool, application_id, DocumentStatus::Processing).await?;
    info!("Processing loan application for: {applicant_name}");

    let outcome = async {
        let raw_text = raw_data
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation("No raw data available".to_string()))?;
        process_application_document(llm, &raw_text, &applicant_name).await
    }
    .await;

    match outcome {
        Ok(data) => {
            sqlx::query(
                "UPDATE loan_applications SET processed_data = $2, updated_at = now() WHERE id = $1",
            )
            .bind(application_id)
            .bind(data)
            .execute(pool)
            .await?;
            info!("Application {application_id} extraction completed");
            Ok(())
        }
        Err(e) => {
            error!("Application {application_id} extraction failed: {e}");
            if let Err(update_err) =
                set_application_status(pool, application_id, DocumentStatus::Failed).await
            {
                error!("Failed to mark application {application_id} as failed: {update_err}");
            }
            Err(e)
        }
    }
}

async fn set_lender_status(
    pool: &PgPool,
    lender_id: Uuid,
    status: DocumentStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE lenders SET status = $2, updated_at = now() WHERE id = $1")
        .bind(lender_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}

async fn set_application_status(
    pool: &PgPool,
    application_id: Uuid,
    status: DocumentStatus,
) -> Result<(), AppError> {
    sqlx::query("UPDATE loan_applications SET status = $2, updated_at = now() WHERE id = $1")
        .bind(application_id)
        .bind(status)
        .execute(pool)
        .await?;
    Ok(())
}
