use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentAdmin;
use crate::core::state::AppState;
use crate::db::models::{QuestionSetRecord, QuizConfig, QuizConfigInput};
use crate::schemas::config::{
    ActivationRequest, ActivationResponse, ApproveQuestionSetRequest, GeneratedDraftResponse,
    QuestionSetResponse, QuizConfigRequest, QuizConfigResponse,
};
use crate::schemas::results::ClearResultsResponse;
use crate::schemas::settings::{GlobalSettingsResponse, GlobalSettingsUpdate};
use crate::services::global_settings;
use crate::services::question_validation;
use crate::services::quiz_generation::{self, QuizGenerator};

pub(super) async fn list_configs(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<QuizConfigResponse>>, ApiError> {
    let configs = state
        .store()
        .list_configs()
        .await
        .map_err(|e| ApiError::store(e, "Failed to list quiz configs"))?;

    Ok(Json(configs.into_iter().map(QuizConfigResponse::from_db).collect()))
}

pub(super) async fn create_config(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuizConfigRequest>,
) -> Result<(StatusCode, Json<QuizConfigResponse>), ApiError> {
    let input = validated_input(&state, payload)?;
    let config = state
        .store()
        .create_config(&input)
        .await
        .map_err(|e| ApiError::store(e, "Failed to create quiz config"))?;

    tracing::info!(
        admin = %admin.sub,
        config_id = %config.id,
        subject = %config.subject,
        unit = %config.unit,
        "Quiz config created"
    );

    Ok((StatusCode::CREATED, Json(QuizConfigResponse::from_db(config))))
}

pub(super) async fn get_config(
    Path(config_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<QuizConfigResponse>, ApiError> {
    let config = fetch_config(&state, &config_id).await?;
    Ok(Json(QuizConfigResponse::from_db(config)))
}

pub(super) async fn update_config(
    Path(config_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<QuizConfigRequest>,
) -> Result<Json<QuizConfigResponse>, ApiError> {
    let input = validated_input(&state, payload)?;
    let active = state
        .store()
        .active_set(&config_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load active question set"))?;
    if let Some(record) = &active {
        ensure_set_covers(usize::try_from(input.question_count).unwrap_or(0), record)?;
    }

    let config = state
        .store()
        .update_config(&config_id, &input)
        .await
        .map_err(|e| ApiError::store(e, "Failed to update quiz config"))?;

    Ok(Json(QuizConfigResponse::from_db(config)))
}

pub(super) async fn delete_config(
    Path(config_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .store()
        .delete_config(&config_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to delete quiz config"))?;

    if !deleted {
        return Err(ApiError::NotFound("Quiz config not found".to_string()));
    }

    tracing::info!(admin = %admin.sub, config_id = %config_id, "Quiz config deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Generates a question set for review. Nothing is stored, and the active
/// set of the unit is left as it was, whether generation succeeds or fails.
pub(super) async fn generate_draft(
    Path(config_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<GeneratedDraftResponse>, ApiError> {
    let config = fetch_config(&state, &config_id).await?;
    let runtime = global_settings::load(state.store(), state.settings())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load generation settings"))?;

    tracing::info!(
        admin = %admin.sub,
        config_id = %config.id,
        model = %runtime.ai_model,
        question_count = config.question_count,
        "Generating quiz draft"
    );

    let generated = QuizGenerator::new(state.generator(), state.retry_policy())
        .generate(&config, &runtime.ai_prompt, &runtime.ai_model)
        .await?;

    Ok(Json(GeneratedDraftResponse {
        config_id: config.id,
        model: runtime.ai_model,
        attempts: generated.attempts,
        questions: generated.questions,
    }))
}

/// Stores reviewed questions as the unit's new active set.
pub(super) async fn approve_question_set(
    Path(config_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ApproveQuestionSetRequest>,
) -> Result<(StatusCode, Json<QuestionSetResponse>), ApiError> {
    let config = fetch_config(&state, &config_id).await?;
    let questions = question_validation::validate(payload.questions, config.question_count())
        .map_err(|e| ApiError::UnprocessableEntity(e.to_string()))?;

    let record = state
        .store()
        .save_and_activate(&config.id, &questions)
        .await
        .map_err(|e| ApiError::store(e, "Failed to save question set"))?;

    tracing::info!(
        admin = %admin.sub,
        config_id = %config.id,
        version = record.version,
        questions = questions.len(),
        "Question set activated"
    );

    Ok((StatusCode::CREATED, Json(QuestionSetResponse::from_db(record))))
}

pub(super) async fn latest_question_set(
    Path(config_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<QuestionSetResponse>, ApiError> {
    let config = fetch_config(&state, &config_id).await?;
    let record = state
        .store()
        .latest_set(&config.id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load question set"))?
        .ok_or_else(|| ApiError::NotFound("No question set generated yet".to_string()))?;

    Ok(Json(QuestionSetResponse::from_db(record)))
}

/// Activates the latest version or takes the unit offline.
pub(super) async fn set_activation(
    Path(config_id): Path<String>,
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<ActivationRequest>,
) -> Result<Json<ActivationResponse>, ApiError> {
    let config = fetch_config(&state, &config_id).await?;

    if payload.active {
        let latest = state
            .store()
            .latest_set(&config.id)
            .await
            .map_err(|e| ApiError::store(e, "Failed to load question set"))?;
        let latest =
            latest.ok_or_else(|| ApiError::Conflict("No question set to activate".to_string()))?;
        ensure_set_covers(config.question_count(), &latest)?;
    }

    let active = state
        .store()
        .set_activation(&config.id, payload.active)
        .await
        .map_err(|e| ApiError::store(e, "Failed to change activation"))?;

    tracing::info!(
        admin = %admin.sub,
        config_id = %config.id,
        active = payload.active,
        "Quiz activation changed"
    );

    Ok(Json(ActivationResponse {
        config_id: config.id,
        active_set: active.map(QuestionSetResponse::from_db),
    }))
}

pub(super) async fn get_settings(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<GlobalSettingsResponse>, ApiError> {
    let current = global_settings::load(state.store(), state.settings())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load settings"))?;
    Ok(Json(current))
}

pub(super) async fn update_settings(
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
    Json(payload): Json<GlobalSettingsUpdate>,
) -> Result<Json<GlobalSettingsResponse>, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;
    if let Some(template) = &payload.ai_prompt {
        quiz_generation::check_template(template).map_err(|e| {
            ApiError::UnprocessableEntity(format!("Prompt template is invalid: {e}"))
        })?;
    }

    global_settings::apply(state.store(), &payload)
        .await
        .map_err(|e| ApiError::store(e, "Failed to save settings"))?;
    let current = global_settings::load(state.store(), state.settings())
        .await
        .map_err(|e| ApiError::store(e, "Failed to load settings"))?;
    Ok(Json(current))
}

pub(super) async fn clear_results(
    CurrentAdmin(admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<ClearResultsResponse>, ApiError> {
    let deleted = state
        .store()
        .clear_attempts()
        .await
        .map_err(|e| ApiError::store(e, "Failed to clear results"))?;

    tracing::warn!(admin = %admin.sub, deleted, "All quiz results deleted");
    Ok(Json(ClearResultsResponse { deleted }))
}

async fn fetch_config(state: &AppState, config_id: &str) -> Result<QuizConfig, ApiError> {
    state
        .store()
        .get_config(config_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load quiz config"))?
        .ok_or_else(|| ApiError::NotFound("Quiz config not found".to_string()))
}

/// A unit never asks for more questions than its set holds.
fn ensure_set_covers(question_count: usize, record: &QuestionSetRecord) -> Result<(), ApiError> {
    let available = record.questions.0.len();
    if question_count > available {
        return Err(ApiError::Conflict(format!(
            "question_count {question_count} exceeds the {available} questions of question set \
             version {}; generate and approve a new set first",
            record.version
        )));
    }
    Ok(())
}

fn validated_input(
    state: &AppState,
    payload: QuizConfigRequest,
) -> Result<QuizConfigInput, ApiError> {
    payload.validate().map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let input = payload.into_input();
    if input.subject.is_empty() || input.unit.is_empty() {
        return Err(ApiError::BadRequest("subject and unit must not be blank".to_string()));
    }
    if input.topics.is_empty() {
        return Err(ApiError::BadRequest("at least one topic is required".to_string()));
    }

    let bounds = state.settings().quiz();
    let count_allowed =
        u32::try_from(input.question_count).is_ok_and(|count| bounds.question_count_allowed(count));
    if !count_allowed {
        return Err(ApiError::UnprocessableEntity(format!(
            "question_count must be between {} and {}",
            bounds.min_questions, bounds.max_questions
        )));
    }

    Ok(input)
}
