use axum::extract::{Path, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::CurrentStudent;
use crate::core::metrics;
use crate::core::security::Claims;
use crate::core::state::AppState;
use crate::schemas::session::{
    AnnouncementResponse, AnswerRequest, SessionResponse, StartSessionRequest, UnitResponse,
};
use crate::services::global_settings;
use crate::services::quiz_session::{Page, QuizSession, SessionError};

pub(super) async fn announcement(
    CurrentStudent(_claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<AnnouncementResponse>, ApiError> {
    let announcement = state
        .store()
        .get_setting(global_settings::ANNOUNCEMENT)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load announcement"))?
        .unwrap_or_default();

    Ok(Json(AnnouncementResponse { announcement }))
}

pub(super) async fn list_subjects(
    CurrentStudent(_claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<String>>, ApiError> {
    let subjects = state
        .store()
        .list_subjects()
        .await
        .map_err(|e| ApiError::store(e, "Failed to list subjects"))?;

    Ok(Json(subjects))
}

pub(super) async fn list_units(
    Path(subject): Path<String>,
    CurrentStudent(_claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<Vec<UnitResponse>>, ApiError> {
    let units = state
        .store()
        .list_units(&subject)
        .await
        .map_err(|e| ApiError::store(e, "Failed to list units"))?;

    Ok(Json(units.into_iter().map(UnitResponse::from_db).collect()))
}

/// Renders the caller's session. A finished session is persisted here if it
/// was not already.
pub(super) async fn get_session(
    CurrentStudent(claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    transition(&state, &claims, Registration::Existing, |_| Ok(())).await
}

pub(super) async fn start_session(
    CurrentStudent(claims): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<StartSessionRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let config = state
        .store()
        .get_config(&payload.config_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load quiz config"))?
        .ok_or_else(|| ApiError::NotFound("Quiz config not found".to_string()))?;
    let active = state
        .store()
        .active_set(&config.id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load active question set"))?;
    let questions = active.as_ref().map(|record| &record.questions.0);

    let view = transition(&state, &claims, Registration::Create, |session| {
        session.start(&config, questions, &mut rand::thread_rng())
    })
    .await?;

    tracing::info!(
        student_id = %claims.sub,
        config_id = %config.id,
        subject = %config.subject,
        unit = %config.unit,
        questions = view.total,
        "Quiz session started"
    );
    Ok(view)
}

pub(super) async fn answer(
    CurrentStudent(claims): CurrentStudent,
    State(state): State<AppState>,
    Json(payload): Json<AnswerRequest>,
) -> Result<Json<SessionResponse>, ApiError> {
    let choice = payload.choice();
    transition(&state, &claims, Registration::Existing, |session| session.submit(choice).map(drop))
        .await
}

pub(super) async fn next_question(
    CurrentStudent(claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    transition(&state, &claims, Registration::Existing, |session| session.next().map(drop)).await
}

pub(super) async fn restart_session(
    CurrentStudent(claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<SessionResponse>, ApiError> {
    transition(&state, &claims, Registration::Existing, |session| {
        session.restart();
        Ok(())
    })
    .await
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Registration {
    /// Register a session when the student has none.
    Create,
    /// Work on a throwaway `start` session when the student has none.
    Existing,
}

/// Applies one step to the caller's session under its lock, persists a
/// finished attempt and renders the result. The registry entry is released
/// afterwards, whatever the outcome.
async fn transition<F>(
    state: &AppState,
    claims: &Claims,
    registration: Registration,
    step: F,
) -> Result<Json<SessionResponse>, ApiError>
where
    F: FnOnce(&mut QuizSession) -> Result<(), SessionError>,
{
    let result = apply_step(state, claims, registration, step).await;
    state.sessions().release(&claims.sub);
    result
}

async fn apply_step<F>(
    state: &AppState,
    claims: &Claims,
    registration: Registration,
    step: F,
) -> Result<Json<SessionResponse>, ApiError>
where
    F: FnOnce(&mut QuizSession) -> Result<(), SessionError>,
{
    let scale = state.settings().quiz().grade_scale;
    let handle = match registration {
        Registration::Create => state.sessions().session(&claims.sub),
        Registration::Existing => match state.sessions().get(&claims.sub) {
            Some(handle) => handle,
            None => {
                let mut session = QuizSession::default();
                step(&mut session)?;
                return Ok(Json(SessionResponse::from_session(&session, scale)));
            }
        },
    };

    let mut session = handle.lock().await;
    step(&mut session)?;
    persist_finished(state, claims, &mut session).await?;
    Ok(Json(SessionResponse::from_session(&session, scale)))
}

async fn persist_finished(
    state: &AppState,
    claims: &Claims,
    session: &mut QuizSession,
) -> Result<(), ApiError> {
    if session.page() != Page::Finished {
        return Ok(());
    }

    let scale = state.settings().quiz().grade_scale;
    let written = session
        .persist_once(&claims.sub, &claims.name, state.store(), scale)
        .await
        .map_err(|e| ApiError::store(e, "Failed to save quiz result"))?;

    if written {
        let grade = session.grade(scale);
        metrics::record_attempt_saved(grade);
        tracing::info!(
            student_id = %claims.sub,
            unit = session.unit().map(|unit| unit.unit.as_str()).unwrap_or_default(),
            score = session.score(),
            total = session.total(),
            grade,
            "Quiz result saved"
        );
    }
    Ok(())
}
