use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::Validate;

use crate::core::time::format_primitive;
use crate::db::models::{QuestionSetRecord, QuizConfig, QuizConfigInput};
use crate::db::types::Difficulty;
use crate::schemas::quiz::QuestionSet;

const fn default_show_feedback() -> bool {
    true
}

#[derive(Debug, Deserialize, Validate)]
pub(crate) struct QuizConfigRequest {
    #[validate(length(min = 1, max = 200, message = "subject must be 1..200 characters"))]
    pub(crate) subject: String,
    #[validate(length(min = 1, max = 200, message = "unit must be 1..200 characters"))]
    pub(crate) unit: String,
    #[validate(length(min = 1, max = 50, message = "topics must contain 1..50 items"))]
    pub(crate) topics: Vec<String>,
    #[validate(range(min = 1, max = 100, message = "question_count must be in range 1..100"))]
    pub(crate) question_count: i32,
    #[serde(default)]
    pub(crate) difficulty: Difficulty,
    #[serde(default = "default_show_feedback")]
    pub(crate) show_feedback: bool,
}

impl QuizConfigRequest {
    pub(crate) fn into_input(self) -> QuizConfigInput {
        QuizConfigInput {
            subject: self.subject.trim().to_string(),
            unit: self.unit.trim().to_string(),
            topics: self
                .topics
                .into_iter()
                .map(|topic| topic.trim().to_string())
                .filter(|topic| !topic.is_empty())
                .collect(),
            question_count: self.question_count,
            difficulty: self.difficulty,
            show_feedback: self.show_feedback,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct QuizConfigResponse {
    pub(crate) id: String,
    pub(crate) subject: String,
    pub(crate) unit: String,
    pub(crate) topics: Vec<String>,
    pub(crate) question_count: i32,
    pub(crate) difficulty: Difficulty,
    pub(crate) show_feedback: bool,
    pub(crate) created_at: String,
    pub(crate) updated_at: String,
}

impl QuizConfigResponse {
    pub(crate) fn from_db(config: QuizConfig) -> Self {
        Self {
            id: config.id,
            subject: config.subject,
            unit: config.unit,
            topics: config.topics.0,
            question_count: config.question_count,
            difficulty: config.difficulty,
            show_feedback: config.show_feedback,
            created_at: format_primitive(config.created_at),
            updated_at: format_primitive(config.updated_at),
        }
    }
}

/// A generated set returned for review; nothing is stored yet.
#[derive(Debug, Serialize)]
pub(crate) struct GeneratedDraftResponse {
    pub(crate) config_id: String,
    pub(crate) model: String,
    pub(crate) attempts: u32,
    pub(crate) questions: QuestionSet,
}

/// Reviewed questions to store and activate. Accepts the same shapes the
/// model produces, so a draft can be sent back as-is or after edits.
#[derive(Debug, Deserialize)]
pub(crate) struct ApproveQuestionSetRequest {
    pub(crate) questions: Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ActivationRequest {
    pub(crate) active: bool,
}

#[derive(Debug, Serialize)]
pub(crate) struct QuestionSetResponse {
    pub(crate) id: String,
    pub(crate) config_id: String,
    pub(crate) version: i32,
    pub(crate) is_active: bool,
    pub(crate) created_at: String,
    pub(crate) questions: QuestionSet,
}

impl QuestionSetResponse {
    pub(crate) fn from_db(record: QuestionSetRecord) -> Self {
        Self {
            id: record.id,
            config_id: record.config_id,
            version: record.version,
            is_active: record.is_active,
            created_at: format_primitive(record.created_at),
            questions: record.questions.0,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct ActivationResponse {
    pub(crate) config_id: String,
    pub(crate) active_set: Option<QuestionSetResponse>,
}
