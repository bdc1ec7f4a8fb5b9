pub mod applications;
pub mod health;
pub mod lenders;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};

use crate::state::AppState;

const MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Lender API
        .route("/api/lenders/upload", post(lenders::upload_lender))
        .route("/api/lenders/", get(lenders::list_lenders))
        .route(
            "/api/lenders/:id",
            get(lenders::get_lender).delete(lenders::delete_lender),
        )
        // Loan application API
        .route(
            "/api/loan-applications/upload",
            post(applications::upload_application),
        )
        .route(
            "/api/loan-applications/",
            get(applications::list_applications),
        )
        .route(
            "/api/loan-applications/:id",
            get(applications::get_application).delete(applications::delete_application),
        )
        .route(
            "/api/loan-applications/:id/matches",
            get(applications::get_application_matches),
        )
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .with_state(state)
}
