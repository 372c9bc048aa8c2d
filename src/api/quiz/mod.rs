mod handlers;

use axum::{routing::get, routing::post, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/announcement", get(handlers::announcement))
        .route("/subjects", get(handlers::list_subjects))
        .route("/subjects/:subject/units", get(handlers::list_units))
        .route("/session", get(handlers::get_session))
        .route("/session/start", post(handlers::start_session))
        .route("/session/answer", post(handlers::answer))
        .route("/session/next", post(handlers::next_question))
        .route("/session/restart", post(handlers::restart_session))
}
