use sqlx::types::Json as SqlxJson;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{QuizConfig, QuizConfigInput, UnitSummary};

pub(crate) const COLUMNS: &str = "\
    id, subject, unit, topics, question_count, difficulty, show_feedback, created_at, updated_at";

pub(crate) async fn create(
    pool: &PgPool,
    id: &str,
    input: &QuizConfigInput,
    now: PrimitiveDateTime,
) -> Result<QuizConfig, sqlx::Error> {
    sqlx::query_as::<_, QuizConfig>(&format!(
        "INSERT INTO quiz_configs (
            id, subject, unit, topics, question_count, difficulty, show_feedback,
            created_at, updated_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(&input.subject)
    .bind(&input.unit)
    .bind(SqlxJson(&input.topics))
    .bind(input.question_count)
    .bind(input.difficulty)
    .bind(input.show_feedback)
    .bind(now)
    .bind(now)
    .fetch_one(pool)
    .await
}

pub(crate) async fn update(
    pool: &PgPool,
    id: &str,
    input: &QuizConfigInput,
    now: PrimitiveDateTime,
) -> Result<Option<QuizConfig>, sqlx::Error> {
    sqlx::query_as::<_, QuizConfig>(&format!(
        "UPDATE quiz_configs
         SET subject = $2, unit = $3, topics = $4, question_count = $5, difficulty = $6,
             show_feedback = $7, updated_at = $8
         WHERE id = $1
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(&input.subject)
    .bind(&input.unit)
    .bind(SqlxJson(&input.topics))
    .bind(input.question_count)
    .bind(input.difficulty)
    .bind(input.show_feedback)
    .bind(now)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn delete(pool: &PgPool, id: &str) -> Result<bool, sqlx::Error> {
    let result =
        sqlx::query("DELETE FROM quiz_configs WHERE id = $1").bind(id).execute(pool).await?;
    Ok(result.rows_affected() > 0)
}

pub(crate) async fn find_by_id(pool: &PgPool, id: &str) -> Result<Option<QuizConfig>, sqlx::Error> {
    sqlx::query_as::<_, QuizConfig>(&format!("SELECT {COLUMNS} FROM quiz_configs WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn list(pool: &PgPool) -> Result<Vec<QuizConfig>, sqlx::Error> {
    sqlx::query_as::<_, QuizConfig>(&format!(
        "SELECT {COLUMNS} FROM quiz_configs ORDER BY subject, unit"
    ))
    .fetch_all(pool)
    .await
}

pub(crate) async fn list_subjects(pool: &PgPool) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>("SELECT DISTINCT subject FROM quiz_configs ORDER BY subject")
        .fetch_all(pool)
        .await
}

/// Units of `subject`, the ones with an active question set first.
pub(crate) async fn list_units(
    pool: &PgPool,
    subject: &str,
) -> Result<Vec<UnitSummary>, sqlx::Error> {
    sqlx::query_as::<_, UnitSummary>(
        "SELECT c.id AS config_id, c.unit, c.show_feedback,
                EXISTS (
                    SELECT 1 FROM question_sets s WHERE s.config_id = c.id AND s.is_active
                ) AS is_active
         FROM quiz_configs c
         WHERE c.subject = $1
         ORDER BY is_active DESC, c.unit",
    )
    .bind(subject)
    .fetch_all(pool)
    .await
}
