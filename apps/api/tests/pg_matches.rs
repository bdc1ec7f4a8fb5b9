//! Schema-level behaviors that only hold against a live PostgreSQL instance:
//! cascade deletion of match rows and the min_score filter predicate.
//!
//! Ignored by default. Run against a database prepared from `schema.sql`:
//!
//!   DATABASE_URL=postgres://... cargo test -- --ignored

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> PgPool {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    PgPoolOptions::new()
        .max_connections(2)
        .connect(&url)
        .await
        .expect("failed to connect to PostgreSQL")
}

/// One application with one completed match per score, each against its own
/// lender. Returns the ids for cleanup.
async fn seed_scored_application(pool: &PgPool, scores: &[f64]) -> (Uuid, Vec<Uuid>) {
    let application_id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO loan_applications (id, applicant_name, status) VALUES ($1, $2, 'completed')",
    )
    .bind(application_id)
    .bind("Integration Applicant")
    .execute(pool)
    .await
    .expect("insert application");

    let mut lender_ids = Vec::new();
    for (i, score) in scores.iter().enumerate() {
        let lender_id = Uuid::new_v4();
        sqlx::query("INSERT INTO lenders (id, lender_name, status) VALUES ($1, $2, 'completed')")
            .bind(lender_id)
            .bind(format!("Integration Lender {i}"))
            .execute(pool)
            .await
            .expect("insert lender");
        sqlx::query(
            "INSERT INTO loan_matches (loan_application_id, lender_id, match_score, status) \
             VALUES ($1, $2, $3, 'completed')",
        )
        .bind(application_id)
        .bind(lender_id)
        .bind(score)
        .execute(pool)
        .await
        .expect("insert match");
        lender_ids.push(lender_id);
    }
    (application_id, lender_ids)
}

async fn cleanup(pool: &PgPool, application_id: Uuid, lender_ids: &[Uuid]) {
    sqlx::query("DELETE FROM loan_applications WHERE id = $1")
        .bind(application_id)
        .execute(pool)
        .await
        .expect("delete application");
    sqlx::query("DELETE FROM lenders WHERE id = ANY($1)")
        .bind(lender_ids)
        .execute(pool)
        .await
        .expect("delete lenders");
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn min_score_filter_returns_descending_subset() {
    let pool = pool().await;
    let (application_id, lender_ids) =
        seed_scored_application(&pool, &[95.0, 75.0, 55.0]).await;

    let rows: Vec<(Uuid, Option<f64>)> = sqlx::query_as(
        "SELECT lender_id, match_score FROM loan_matches \
         WHERE loan_application_id = $1 \
           AND ($2::float8 IS NULL OR match_score >= $2) \
         ORDER BY match_score DESC NULLS LAST",
    )
    .bind(application_id)
    .bind(Some(70.0_f64))
    .fetch_all(&pool)
    .await
    .expect("filtered select");

    let scores: Vec<f64> = rows.iter().filter_map(|(_, s)| *s).collect();
    assert_eq!(scores, vec![95.0, 75.0]);

    cleanup(&pool, application_id, &lender_ids).await;
}

#[tokio::test]
#[ignore = "requires PostgreSQL (set DATABASE_URL)"]
async fn deleting_application_cascades_match_rows() {
    let pool = pool().await;
    let (application_id, lender_ids) = seed_scored_application(&pool, &[80.0]).await;

    sqlx::query("DELETE FROM loan_applications WHERE id = $1")
        .bind(application_id)
        .execute(&pool)
        .await
        .expect("delete application");

    let (remaining,): (i64,) =
        sqlx::query_as("SELECT COUNT(*) FROM loan_matches WHERE loan_application_id = $1")
            .bind(application_id)
            .fetch_one(&pool)
            .await
            .expect("count matches");
    assert_eq!(remaining, 0, "match rows survived the cascade");

    // Lender rows are untouched by the cascade.
    let (lenders,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM lenders WHERE id = ANY($1)")
        .bind(&lender_ids)
        .fetch_one(&pool)
        .await
        .expect("count lenders");
    assert_eq!(lenders, 1);

    cleanup(&pool, application_id, &lender_ids).await;
}
