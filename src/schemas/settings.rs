use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub(crate) struct GlobalSettingsResponse {
    pub(crate) announcement: String,
    pub(crate) ai_model: String,
    pub(crate) ai_prompt: String,
}

/// Omitted fields keep their current value.
#[derive(Debug, Deserialize, Validate)]
pub(crate) struct GlobalSettingsUpdate {
    #[serde(default)]
    #[validate(length(max = 5000, message = "announcement must be at most 5000 characters"))]
    pub(crate) announcement: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "ai_model must be 1..200 characters"))]
    pub(crate) ai_model: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, max = 50000, message = "ai_prompt must be 1..50000 characters"))]
    pub(crate) ai_prompt: Option<String>,
}
