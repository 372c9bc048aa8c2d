mod handlers;

use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/configs", get(handlers::list_configs).post(handlers::create_config))
        .route(
            "/configs/:config_id",
            get(handlers::get_config).put(handlers::update_config).delete(handlers::delete_config),
        )
        .route("/configs/:config_id/generate", post(handlers::generate_draft))
        .route("/configs/:config_id/question-sets", post(handlers::approve_question_set))
        .route("/configs/:config_id/question-sets/latest", get(handlers::latest_question_set))
        .route("/configs/:config_id/activation", put(handlers::set_activation))
        .route("/settings", get(handlers::get_settings).put(handlers::update_settings))
        .route("/results", delete(handlers::clear_results))
}
