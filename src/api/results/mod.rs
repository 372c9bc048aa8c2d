mod handlers;

use axum::{routing::get, Router};

use crate::core::state::AppState;

pub(crate) fn router() -> Router<AppState> {
    Router::new()
        .route("/subjects/:subject", get(handlers::ranking))
        .route("/subjects/:subject/gradebook", get(handlers::gradebook))
        .route("/:attempt_id", get(handlers::attempt_review))
}

#[cfg(test)]
mod tests;
