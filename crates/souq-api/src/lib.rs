pub mod error;
pub mod intake;
pub mod messages;
pub mod middleware;
pub mod moderation;
pub mod notifications;
pub mod preferences;
pub mod state;

use axum::{
    Router, middleware as axum_middleware,
    routing::{get, post},
};

use crate::middleware::{require_auth, require_internal_token};
use crate::state::AppState;

/// REST routes of the delivery core. The WebSocket upgrade is mounted by the
/// server binary.
pub fn routes(state: AppState) -> Router {
    let protected = Router::new()
        .route("/messages", post(messages::send_message))
        .route("/messages/ack", post(messages::ack_messages))
        .route("/conversations/{peer_id}/messages", get(messages::get_conversation))
        .route("/conversations/{peer_id}/read", post(messages::read_conversation))
        .route("/notifications", get(notifications::list_notifications))
        .route("/notifications/read-all", post(notifications::mark_all_read))
        .route("/notifications/{id}/read", post(notifications::mark_read))
        .route(
            "/preferences",
            get(preferences::get_preferences).put(preferences::update_preferences),
        )
        .route("/moderation/check", post(moderation::check))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_auth));

    let internal = Router::new()
        .route("/internal/events", post(intake::ingest_event))
        .layer(axum_middleware::from_fn_with_state(state.clone(), require_internal_token));

    Router::new()
        .merge(protected)
        .merge(internal)
        .with_state(state)
}
