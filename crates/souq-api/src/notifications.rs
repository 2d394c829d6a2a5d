use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use souq_gateway::dispatcher::Dispatcher;
use souq_types::api::{
    Claims, MarkAllReadRequest, NotificationListResponse, NotificationView, UpdatedResponse,
};
use souq_types::events::GatewayEvent;
use souq_types::models::Notification;
use souq_types::store::{NotificationStore, ReadOutcome};

use crate::error::{ApiError, blocking};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub view: NotificationView,
    pub limit: Option<u32>,
}

/// Push a freshly persisted notification to the recipient's live connections.
pub async fn push_notification(dispatcher: &Dispatcher, notification: Notification) {
    let user_id = notification.user_id;
    dispatcher
        .send_to_user(user_id, GatewayEvent::NewNotification { notification })
        .await;
}

/// GET /notifications: newest first, capped by view.
pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let cap = match query.view {
        NotificationView::Preview => state.limits.notification_preview,
        NotificationView::Full => state.limits.notification_max,
    };
    let limit = query.limit.unwrap_or(cap).clamp(1, cap);

    let db = state.db.clone();
    let user_id = claims.sub;
    let (notifications, unread_count) = blocking(move || {
        let notifications = db.list_notifications(user_id, limit)?;
        let unread_count = db.unread_count(user_id)?;
        Ok((notifications, unread_count))
    })
    .await?;

    Ok(Json(NotificationListResponse {
        notifications,
        unread_count,
    }))
}

/// POST /notifications/{id}/read: idempotent.
pub async fn mark_read(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Extension(claims): Extension<Claims>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;
    match blocking(move || db.mark_notification_read(user_id, id)).await? {
        ReadOutcome::Marked | ReadOutcome::AlreadyRead => Ok(StatusCode::NO_CONTENT),
        ReadOutcome::NotFound => Err(ApiError::NotFound),
    }
}

/// POST /notifications/read-all: idempotent sweep over what existed when it
/// started (or up to the client's newest seen notification).
pub async fn mark_all_read(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<MarkAllReadRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let db = state.db.clone();
    let user_id = claims.sub;
    let updated = blocking(move || db.mark_all_read(user_id, req.up_to)).await?;
    Ok(Json(UpdatedResponse { updated }))
}
