use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use time::PrimitiveDateTime;

use crate::db::types::Difficulty;
use crate::schemas::quiz::{Choice, Question, QuestionSet};

/// One gradable unit of a subject. `(subject, unit)` is unique.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizConfig {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) topics: Json<Vec<String>>,
    pub(crate) question_count: i32,
    pub(crate) difficulty: Difficulty,
    pub(crate) show_feedback: bool,
    pub(crate) created_at: PrimitiveDateTime,
    pub(crate) updated_at: PrimitiveDateTime,
}

impl QuizConfig {
    pub(crate) fn question_count(&self) -> usize {
        usize::try_from(self.question_count).unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuestionSetRecord {
    pub(crate) id: String,
    pub(crate) config_id: String,
    pub(crate) version: i32,
    pub(crate) questions: Json<QuestionSet>,
    pub(crate) is_active: bool,
    pub(crate) created_at: PrimitiveDateTime,
}

/// A unit as listed to students: whether it can be started right now.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct UnitSummary {
    pub(crate) config_id: String,
    pub(crate) unit: String,
    pub(crate) show_feedback: bool,
    pub(crate) is_active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct QuizAttempt {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) config_id: Option<String>,
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) show_feedback: bool,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) grade: f64,
    pub(crate) questions: Json<Vec<Question>>,
    pub(crate) answers: Json<Vec<Choice>>,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Attempt row without the frozen snapshot, used by rankings.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct AttemptSummary {
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) unit: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) grade: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Grade of one attempt on an evaluative unit (feedback disabled).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub(crate) struct GradeEntry {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) unit: String,
    pub(crate) grade: f64,
    pub(crate) created_at: PrimitiveDateTime,
}

/// Input for appending an attempt; the store assigns id and timestamp.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewAttempt {
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) config_id: String,
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) show_feedback: bool,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) grade: f64,
    pub(crate) questions: Vec<Question>,
    pub(crate) answers: Vec<Choice>,
}

/// Fields an administrator supplies when creating or editing a unit.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct QuizConfigInput {
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) topics: Vec<String>,
    pub(crate) question_count: i32,
    pub(crate) difficulty: Difficulty,
    pub(crate) show_feedback: bool,
}
