use serde::{Deserialize, Serialize};

use crate::core::time::format_primitive;
use crate::db::models::{AttemptSummary, QuizAttempt};
use crate::schemas::session::{review_items, ReviewItem};
use crate::services::gradebook::GradePolicy;

#[derive(Debug, Serialize)]
pub(crate) struct AttemptSummaryResponse {
    pub(crate) id: String,
    pub(crate) student_name: String,
    pub(crate) unit: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) grade: f64,
    pub(crate) created_at: String,
}

impl AttemptSummaryResponse {
    pub(crate) fn from_db(summary: AttemptSummary) -> Self {
        Self {
            id: summary.id,
            student_name: summary.student_name,
            unit: summary.unit,
            score: summary.score,
            total_questions: summary.total_questions,
            grade: summary.grade,
            created_at: format_primitive(summary.created_at),
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct AttemptReviewResponse {
    pub(crate) id: String,
    pub(crate) student_id: String,
    pub(crate) student_name: String,
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) score: i32,
    pub(crate) total_questions: i32,
    pub(crate) grade: f64,
    pub(crate) created_at: String,
    pub(crate) items: Vec<ReviewItem>,
}

impl AttemptReviewResponse {
    pub(crate) fn from_db(attempt: QuizAttempt) -> Self {
        let items = review_items(&attempt.questions, &attempt.answers);
        Self {
            id: attempt.id,
            student_id: attempt.student_id,
            student_name: attempt.student_name,
            subject: attempt.subject,
            unit: attempt.unit,
            score: attempt.score,
            total_questions: attempt.total_questions,
            grade: attempt.grade,
            created_at: format_primitive(attempt.created_at),
            items,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct GradebookQuery {
    #[serde(default)]
    pub(crate) policy: GradePolicy,
}

#[derive(Debug, Serialize)]
pub(crate) struct ClearResultsResponse {
    pub(crate) deleted: u64,
}
