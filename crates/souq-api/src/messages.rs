use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::{info, warn};
use uuid::Uuid;

use souq_gateway::delivery;
use souq_types::api::{AckRequest, AckResponse, Claims, SendMessageRequest, UpdatedResponse};
use souq_types::events::{DomainEvent, GatewayEvent};
use souq_types::models::{DeliveryStatus, Message, MessageDraft};
use souq_types::store::MessageStore;

use crate::error::{ApiError, blocking};
use crate::notifications::push_notification;
use crate::state::AppState;

/// Longest accepted message body, in characters.
const MAX_CONTENT_CHARS: usize = 5000;

/// POST /messages: validate, persist, then push. Returns the stored message
/// carrying its permanent id.
pub async fn send_message(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SendMessageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let content = req.content.trim().to_string();
    if content.is_empty() {
        return Err(ApiError::BadRequest("message is empty".into()));
    }
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(ApiError::BadRequest("message is too long".into()));
    }
    if req.to_user_id == claims.sub {
        return Err(ApiError::BadRequest("cannot message yourself".into()));
    }

    if let Some(kind) = souq_guard::classify(&content).violation {
        info!("Message from {} rejected: {}", claims.sub, kind.code());
        return Err(ApiError::Rejected(kind));
    }

    let draft = MessageDraft {
        from_user_id: claims.sub,
        to_user_id: req.to_user_id,
        project_id: req.project_id,
        content,
        client_ref: req.client_ref,
    };
    let db = state.db.clone();
    let message = blocking(move || db.append_message(&draft)).await?;

    // Durable from here on; pushes are best-effort.
    let push = GatewayEvent::NewMessage {
        message: message.clone(),
    };
    state.dispatcher.send_to_user(message.to_user_id, push.clone()).await;
    state.dispatcher.send_to_user(message.from_user_id, push).await;

    if let Some(message_id) = message.id.permanent() {
        let event = DomainEvent::NewMessage {
            message_id,
            from_user_id: message.from_user_id,
            sender_name: claims.username.clone(),
            preview: message.content.clone(),
            project_id: message.project_id,
        };
        let fanout = state.fanout.clone();
        let recipient = message.to_user_id;
        // The message is already accepted; a fan-out failure must not undo that.
        match blocking(move || fanout.notify(&event, recipient)).await {
            Ok(Some(notification)) => push_notification(&state.dispatcher, notification).await,
            Ok(None) => {}
            Err(e) => warn!("Message notification for {} failed: {}", recipient, e),
        }
    }

    Ok((StatusCode::CREATED, Json(message)))
}

/// GET /conversations/{peer_id}/messages: confirmed history, oldest first.
/// Fetching counts as receipt: `sent` messages addressed to the viewer become
/// `delivered` before the response is built.
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let viewer = claims.sub;
    let limit = state.limits.conversation;
    let db = state.db.clone();

    let (mut messages, delivered) = blocking(move || {
        let messages = db.load_conversation(viewer, peer_id, limit)?;
        let pending: Vec<Uuid> = messages
            .iter()
            .filter(|m| m.to_user_id == viewer && m.delivery_status == DeliveryStatus::Sent)
            .filter_map(|m| m.id.permanent())
            .collect();
        let delivered = db.mark_delivered(viewer, &pending)?;
        Ok((messages, delivered))
    })
    .await?;

    for changed in &delivered {
        if let Some(m) = messages.iter_mut().find(|m| m.id == changed.id) {
            m.delivery_status = changed.delivery_status;
        }
    }
    delivery::announce_delivered(&state.dispatcher, &delivered).await;

    Ok(Json::<Vec<Message>>(messages))
}

/// POST /messages/ack: REST twin of the gateway `ack` command.
pub async fn ack_messages(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<AckRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let delivered =
        delivery::acknowledge(state.message_store(), &state.dispatcher, claims.sub, req.message_ids)
            .await?;
    Ok(Json(AckResponse { delivered }))
}

/// POST /conversations/{peer_id}/read
pub async fn read_conversation(
    State(state): State<AppState>,
    Path(peer_id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let viewer = claims.sub;
    let updated = blocking(move || db.mark_conversation_read(viewer, peer_id)).await?;
    Ok(Json(UpdatedResponse { updated }))
}
