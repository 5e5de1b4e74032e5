pub mod health;

use axum::{
    routing::{delete, get, post},
    Router,
};

use crate::chat::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Conversational search
        .route("/api/v1/chat/candidates", post(handlers::handle_candidate_chat))
        .route("/api/v1/chat/jobs", post(handlers::handle_job_chat))
        .route(
            "/api/v1/chat/sessions/:id",
            delete(handlers::handle_delete_session),
        )
        .with_state(state)
}
