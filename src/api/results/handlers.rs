use axum::extract::{Path, Query, State};
use axum::Json;

use crate::api::errors::ApiError;
use crate::api::guards::{CurrentAdmin, CurrentStudent};
use crate::api::pagination::{PageParams, PaginatedResponse};
use crate::core::state::AppState;
use crate::schemas::results::{AttemptReviewResponse, AttemptSummaryResponse, GradebookQuery};
use crate::services::gradebook::{self, Gradebook};

pub(super) async fn ranking(
    Path(subject): Path<String>,
    Query(params): Query<PageParams>,
    CurrentStudent(_claims): CurrentStudent,
    State(state): State<AppState>,
) -> Result<Json<PaginatedResponse<AttemptSummaryResponse>>, ApiError> {
    let (skip, limit) = params.bounds();

    let (attempts, total_count) = state
        .store()
        .list_attempts(&subject, skip, limit)
        .await
        .map_err(|e| ApiError::store(e, "Failed to list results"))?;

    let items = attempts.into_iter().map(AttemptSummaryResponse::from_db).collect();
    Ok(Json(PaginatedResponse { items, total_count, skip, limit }))
}

pub(super) async fn gradebook(
    Path(subject): Path<String>,
    Query(params): Query<GradebookQuery>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<Gradebook>, ApiError> {
    let entries = state
        .store()
        .evaluative_grades(&subject)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load grades"))?;

    Ok(Json(gradebook::consolidate(&entries, params.policy)))
}

pub(super) async fn attempt_review(
    Path(attempt_id): Path<String>,
    CurrentAdmin(_admin): CurrentAdmin,
    State(state): State<AppState>,
) -> Result<Json<AttemptReviewResponse>, ApiError> {
    let attempt = state
        .store()
        .get_attempt(&attempt_id)
        .await
        .map_err(|e| ApiError::store(e, "Failed to load result"))?
        .ok_or_else(|| ApiError::NotFound("Result not found".to_string()))?;

    Ok(Json(AttemptReviewResponse::from_db(attempt)))
}
