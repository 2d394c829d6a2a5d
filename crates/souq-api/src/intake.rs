use axum::{Json, extract::State, response::IntoResponse};
use tracing::info;

use souq_types::api::{EventIntakeRequest, EventIntakeResponse};

use crate::error::{ApiError, blocking};
use crate::notifications::push_notification;
use crate::state::AppState;

/// POST /internal/events: domain events raised by the offers, projects and
/// payments subsystems enter the fan-out here.
pub async fn ingest_event(
    State(state): State<AppState>,
    Json(req): Json<EventIntakeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let kind = req.event.kind();
    let recipient = req.recipient_id;
    let fanout = state.fanout.clone();
    let event = req.event;

    let notification = blocking(move || fanout.notify(&event, recipient)).await?;

    if let Some(n) = &notification {
        info!("{} notification {} created for {}", kind.as_str(), n.id, recipient);
        push_notification(&state.dispatcher, n.clone()).await;
    }

    Ok(Json(EventIntakeResponse { notification }))
}
