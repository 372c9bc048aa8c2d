use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::core::time::primitive_now_utc;
use crate::db::models::{
    AttemptSummary, GradeEntry, NewAttempt, QuestionSetRecord, QuizAttempt, QuizConfig,
    QuizConfigInput, UnitSummary,
};
use crate::repositories::{global_settings, question_sets, quiz_attempts, quiz_configs};
use crate::schemas::quiz::QuestionSet;

#[derive(Debug, Error)]
pub(crate) enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("{0}")]
    Conflict(String),
    #[error("database error")]
    Database(#[source] sqlx::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => Self::NotFound,
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                Self::Conflict(db_err.message().to_string())
            }
            _ => Self::Database(err),
        }
    }
}

/// Sink for finished attempts. Split from [`QuizStore`] so the session only
/// depends on the one write it performs.
#[async_trait]
pub(crate) trait AttemptRecorder: Send + Sync {
    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<QuizAttempt, StoreError>;
}

#[async_trait]
pub(crate) trait QuizStore: AttemptRecorder {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn list_configs(&self) -> Result<Vec<QuizConfig>, StoreError>;
    async fn list_subjects(&self) -> Result<Vec<String>, StoreError>;
    async fn list_units(&self, subject: &str) -> Result<Vec<UnitSummary>, StoreError>;
    async fn get_config(&self, id: &str) -> Result<Option<QuizConfig>, StoreError>;
    /// Fails with [`StoreError::Conflict`] when `(subject, unit)` exists.
    async fn create_config(&self, input: &QuizConfigInput) -> Result<QuizConfig, StoreError>;
    async fn update_config(
        &self,
        id: &str,
        input: &QuizConfigInput,
    ) -> Result<QuizConfig, StoreError>;
    async fn delete_config(&self, id: &str) -> Result<bool, StoreError>;

    /// Deactivates the current set and activates `questions` as one unit.
    async fn save_and_activate(
        &self,
        config_id: &str,
        questions: &QuestionSet,
    ) -> Result<QuestionSetRecord, StoreError>;
    async fn active_set(&self, config_id: &str) -> Result<Option<QuestionSetRecord>, StoreError>;
    async fn latest_set(&self, config_id: &str) -> Result<Option<QuestionSetRecord>, StoreError>;
    async fn set_activation(
        &self,
        config_id: &str,
        active: bool,
    ) -> Result<Option<QuestionSetRecord>, StoreError>;

    async fn list_attempts(
        &self,
        subject: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<AttemptSummary>, i64), StoreError>;
    async fn get_attempt(&self, id: &str) -> Result<Option<QuizAttempt>, StoreError>;
    async fn clear_attempts(&self) -> Result<u64, StoreError>;
    async fn evaluative_grades(&self, subject: &str) -> Result<Vec<GradeEntry>, StoreError>;

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

#[derive(Clone)]
pub(crate) struct PgQuizStore {
    pool: PgPool,
}

impl PgQuizStore {
    pub(crate) fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AttemptRecorder for PgQuizStore {
    async fn record_attempt(&self, attempt: &NewAttempt) -> Result<QuizAttempt, StoreError> {
        let id = Uuid::new_v4().to_string();
        let record = quiz_attempts::insert(&self.pool, &id, attempt, primitive_now_utc()).await?;
        Ok(record)
    }
}

#[async_trait]
impl QuizStore for PgQuizStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn list_configs(&self) -> Result<Vec<QuizConfig>, StoreError> {
        Ok(quiz_configs::list(&self.pool).await?)
    }

    async fn list_subjects(&self) -> Result<Vec<String>, StoreError> {
        Ok(quiz_configs::list_subjects(&self.pool).await?)
    }

    async fn list_units(&self, subject: &str) -> Result<Vec<UnitSummary>, StoreError> {
        Ok(quiz_configs::list_units(&self.pool, subject).await?)
    }

    async fn get_config(&self, id: &str) -> Result<Option<QuizConfig>, StoreError> {
        Ok(quiz_configs::find_by_id(&self.pool, id).await?)
    }

    async fn create_config(&self, input: &QuizConfigInput) -> Result<QuizConfig, StoreError> {
        let id = Uuid::new_v4().to_string();
        Ok(quiz_configs::create(&self.pool, &id, input, primitive_now_utc()).await?)
    }

    async fn update_config(
        &self,
        id: &str,
        input: &QuizConfigInput,
    ) -> Result<QuizConfig, StoreError> {
        quiz_configs::update(&self.pool, id, input, primitive_now_utc())
            .await?
            .ok_or(StoreError::NotFound)
    }

    async fn delete_config(&self, id: &str) -> Result<bool, StoreError> {
        Ok(quiz_configs::delete(&self.pool, id).await?)
    }

    async fn save_and_activate(
        &self,
        config_id: &str,
        questions: &QuestionSet,
    ) -> Result<QuestionSetRecord, StoreError> {
        let id = Uuid::new_v4().to_string();
        let record = question_sets::save_and_activate(
            &self.pool,
            &id,
            config_id,
            questions,
            primitive_now_utc(),
        )
        .await?;
        Ok(record)
    }

    async fn active_set(&self, config_id: &str) -> Result<Option<QuestionSetRecord>, StoreError> {
        Ok(question_sets::find_active(&self.pool, config_id).await?)
    }

    async fn latest_set(&self, config_id: &str) -> Result<Option<QuestionSetRecord>, StoreError> {
        Ok(question_sets::find_latest(&self.pool, config_id).await?)
    }

    async fn set_activation(
        &self,
        config_id: &str,
        active: bool,
    ) -> Result<Option<QuestionSetRecord>, StoreError> {
        Ok(question_sets::set_activation(&self.pool, config_id, active).await?)
    }

    async fn list_attempts(
        &self,
        subject: &str,
        skip: i64,
        limit: i64,
    ) -> Result<(Vec<AttemptSummary>, i64), StoreError> {
        Ok(quiz_attempts::list_by_subject(&self.pool, subject, skip, limit).await?)
    }

    async fn get_attempt(&self, id: &str) -> Result<Option<QuizAttempt>, StoreError> {
        Ok(quiz_attempts::find_by_id(&self.pool, id).await?)
    }

    async fn clear_attempts(&self) -> Result<u64, StoreError> {
        Ok(quiz_attempts::delete_all(&self.pool).await?)
    }

    async fn evaluative_grades(&self, subject: &str) -> Result<Vec<GradeEntry>, StoreError> {
        Ok(quiz_attempts::evaluative_grades(&self.pool, subject).await?)
    }

    async fn get_setting(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(global_settings::get(&self.pool, key).await?)
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), StoreError> {
        Ok(global_settings::upsert(&self.pool, key, value, primitive_now_utc()).await?)
    }
}
