use sqlx::types::Json as SqlxJson;
use sqlx::PgPool;
use time::PrimitiveDateTime;

use crate::db::models::{AttemptSummary, GradeEntry, NewAttempt, QuizAttempt};

pub(crate) const COLUMNS: &str = "\
    id, student_id, student_name, config_id, subject, unit, show_feedback, score,
    total_questions, grade, questions, answers, created_at";

pub(crate) async fn insert(
    pool: &PgPool,
    id: &str,
    attempt: &NewAttempt,
    now: PrimitiveDateTime,
) -> Result<QuizAttempt, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!(
        "INSERT INTO quiz_attempts (
            id, student_id, student_name, config_id, subject, unit, show_feedback, score,
            total_questions, grade, questions, answers, created_at
         ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13)
         RETURNING {COLUMNS}"
    ))
    .bind(id)
    .bind(&attempt.student_id)
    .bind(&attempt.student_name)
    .bind(&attempt.config_id)
    .bind(&attempt.subject)
    .bind(&attempt.unit)
    .bind(attempt.show_feedback)
    .bind(attempt.score)
    .bind(attempt.total_questions)
    .bind(attempt.grade)
    .bind(SqlxJson(&attempt.questions))
    .bind(SqlxJson(&attempt.answers))
    .bind(now)
    .fetch_one(pool)
    .await
}

#[derive(Debug, sqlx::FromRow)]
struct AttemptSummaryRow {
    #[sqlx(flatten)]
    summary: AttemptSummary,
    total_count: i64,
}

/// Newest first, with the total number of attempts for the subject.
pub(crate) async fn list_by_subject(
    pool: &PgPool,
    subject: &str,
    skip: i64,
    limit: i64,
) -> Result<(Vec<AttemptSummary>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, AttemptSummaryRow>(
        "SELECT id, student_name, unit, score, total_questions, grade, created_at,
                COUNT(*) OVER() AS total_count
         FROM quiz_attempts
         WHERE subject = $1
         ORDER BY created_at DESC, id
         OFFSET $2 LIMIT $3",
    )
    .bind(subject)
    .bind(skip)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    let total = match rows.first() {
        Some(row) => row.total_count,
        None => count_by_subject(pool, subject).await?,
    };
    Ok((rows.into_iter().map(|row| row.summary).collect(), total))
}

async fn count_by_subject(pool: &PgPool, subject: &str) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM quiz_attempts WHERE subject = $1")
        .bind(subject)
        .fetch_one(pool)
        .await
}

pub(crate) async fn find_by_id(
    pool: &PgPool,
    id: &str,
) -> Result<Option<QuizAttempt>, sqlx::Error> {
    sqlx::query_as::<_, QuizAttempt>(&format!("SELECT {COLUMNS} FROM quiz_attempts WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await
}

pub(crate) async fn delete_all(pool: &PgPool) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM quiz_attempts").execute(pool).await?;
    Ok(result.rows_affected())
}

/// Grades of attempts taken without immediate feedback, which are the ones
/// that count towards the gradebook.
pub(crate) async fn evaluative_grades(
    pool: &PgPool,
    subject: &str,
) -> Result<Vec<GradeEntry>, sqlx::Error> {
    sqlx::query_as::<_, GradeEntry>(
        "SELECT student_id, student_name, unit, grade, created_at
         FROM quiz_attempts
         WHERE subject = $1 AND NOT show_feedback
         ORDER BY created_at",
    )
    .bind(subject)
    .fetch_all(pool)
    .await
}
