use sqlx::types::Json as SqlxJson;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::QuestionSetRecord;
use crate::schemas::quiz::QuestionSet;

pub(crate) const COLUMNS: &str = "id, config_id, version, questions, is_active, created_at";

/// Stores `questions` as the next version of the unit and makes it the only
/// active one. Readers see either the old or the new active set.
pub(crate) async fn save_and_activate(
    pool: &PgPool,
    id: &str,
    config_id: &str,
    questions: &QuestionSet,
    now: PrimitiveDateTime,
) -> Result<QuestionSetRecord, sqlx::Error> {
    let mut tx = pool.begin().await?;

    // Serializes concurrent swaps for the same unit.
    sqlx::query("SELECT id FROM quiz_configs WHERE id = $1 FOR UPDATE")
        .bind(config_id)
        .fetch_one(&mut *tx)
        .await?;

    sqlx::query("UPDATE question_sets SET is_active = FALSE WHERE config_id = $1 AND is_active")
        .bind(config_id)
        .execute(&mut *tx)
        .await?;

    let record = sqlx::query_as::<_, QuestionSetRecord>(&format!(
        "INSERT INTO question_sets (id, config_id, version, questions, is_active, created_at)
         SELECT $1, $2, COALESCE(MAX(version), 0) + 1, $3, TRUE, $4
         FROM question_sets WHERE config_id = $2
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(config_id)
    .bind(SqlxJson(questions))
    .bind(now)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(record)
}

pub(crate) async fn find_active(
    pool: &PgPool,
    config_id: &str,
) -> Result<Option<QuestionSetRecord>, sqlx::Error> {
    sqlx::query_as::<_, QuestionSetRecord>(&format!(
        "SELECT {COLUMNS} FROM question_sets WHERE config_id = $1 AND is_active"
    ))
    .bind(config_id)
    .fetch_optional(pool)
    .await
}

pub(crate) async fn find_latest(
    pool: &PgPool,
    config_id: &str,
) -> Result<Option<QuestionSetRecord>, sqlx::Error> {
    sqlx::query_as::<_, QuestionSetRecord>(&format!(
        "SELECT {COLUMNS} FROM question_sets WHERE config_id = $1
         ORDER BY version DESC LIMIT 1"
    ))
    .bind(config_id)
    .fetch_optional(pool)
    .await
}

/// Activates the latest version, or deactivates every version of the unit.
/// Returns the set that is active afterwards.
pub(crate) async fn set_activation(
    pool: &PgPool,
    config_id: &str,
    active: bool,
) -> Result<Option<QuestionSetRecord>, sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("UPDATE question_sets SET is_active = FALSE WHERE config_id = $1 AND is_active")
        .bind(config_id)
        .execute(&mut *tx)
        .await?;

    let record = if active {
        sqlx::query_as::<_, QuestionSetRecord>(&format!(
            "UPDATE question_sets SET is_active = TRUE
             WHERE id = (
                SELECT id FROM question_sets WHERE config_id = $1
                ORDER BY version DESC LIMIT 1
             )
             RETURNING {COLUMNS}"
        ))
        .bind(config_id)
        .fetch_optional(&mut *tx)
        .await?
    } else {
        None
    };

    tx.commit().await?;
    Ok(record)
}
