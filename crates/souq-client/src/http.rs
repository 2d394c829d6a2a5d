use std::future::Future;
use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use thiserror::Error;
use uuid::Uuid;

use souq_guard::ViolationKind;
use souq_types::api::{
    AckRequest, AckResponse, ErrorBody, MarkAllReadRequest, NotificationListResponse,
    PreferenceUpdate, SendMessageRequest, UpdatedResponse,
};
use souq_types::models::{Message, PreferenceSet};

use crate::config::ClientConfig;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The message carried off-platform contact details. Edit, don't retry.
    #[error("{}", .0.message())]
    Rejected(ViolationKind),

    #[error("request timed out")]
    Timeout,

    #[error("server returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("invalid payload: {0}")]
    Decode(#[from] serde_json::Error),
}

impl ClientError {
    /// Failures that leave a pending send `failed` rather than rejected.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::Rejected(_))
    }
}

/// Request body for a pending message. The client ref rides along so the
/// resulting push can be matched to the pending entry.
pub fn send_request(pending: &Message) -> SendMessageRequest {
    SendMessageRequest {
        to_user_id: pending.to_user_id,
        project_id: pending.project_id,
        content: pending.content.clone(),
        client_ref: pending.client_ref,
    }
}

/// Await `request` for at most `timeout`.
pub async fn with_timeout<T, F>(timeout: Duration, request: F) -> Result<T, ClientError>
where
    F: Future<Output = Result<T, ClientError>>,
{
    tokio::time::timeout(timeout, request)
        .await
        .map_err(|_| ClientError::Timeout)?
}

/// REST client for the messaging and notification endpoints.
#[derive(Debug, Clone)]
pub struct SouqClient {
    http: Client,
    config: ClientConfig,
}

impl SouqClient {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            http: Client::new(),
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub async fn send_message(&self, req: &SendMessageRequest) -> Result<Message, ClientError> {
        self.json(self.authed(self.http.post(self.config.url("/messages"))).json(req))
            .await
    }

    /// Send bounded by the configured send timeout.
    pub async fn send_with_timeout(&self, req: &SendMessageRequest) -> Result<Message, ClientError> {
        with_timeout(self.config.send_timeout, self.send_message(req)).await
    }

    pub async fn conversation(&self, peer_id: Uuid) -> Result<Vec<Message>, ClientError> {
        let url = self.config.url(&format!("/conversations/{}/messages", peer_id));
        self.json(self.authed(self.http.get(url))).await
    }

    pub async fn read_conversation(&self, peer_id: Uuid) -> Result<UpdatedResponse, ClientError> {
        let url = self.config.url(&format!("/conversations/{}/read", peer_id));
        self.json(self.authed(self.http.post(url))).await
    }

    pub async fn ack(&self, message_ids: Vec<Uuid>) -> Result<AckResponse, ClientError> {
        let body = AckRequest { message_ids };
        self.json(self.authed(self.http.post(self.config.url("/messages/ack"))).json(&body))
            .await
    }

    /// Capped newest-first preview for the badge dropdown.
    pub async fn notification_preview(&self) -> Result<NotificationListResponse, ClientError> {
        self.json(self.authed(self.http.get(self.config.url("/notifications"))))
            .await
    }

    pub async fn notifications(&self) -> Result<NotificationListResponse, ClientError> {
        let url = self.config.url("/notifications?view=full");
        self.json(self.authed(self.http.get(url))).await
    }

    pub async fn mark_notification_read(&self, id: Uuid) -> Result<(), ClientError> {
        let url = self.config.url(&format!("/notifications/{}/read", id));
        check(self.authed(self.http.post(url)).send().await?).await?;
        Ok(())
    }

    pub async fn mark_all_read(&self, up_to: Option<Uuid>) -> Result<UpdatedResponse, ClientError> {
        let body = MarkAllReadRequest { up_to };
        let url = self.config.url("/notifications/read-all");
        self.json(self.authed(self.http.post(url)).json(&body)).await
    }

    pub async fn preferences(&self) -> Result<PreferenceSet, ClientError> {
        self.json(self.authed(self.http.get(self.config.url("/preferences"))))
            .await
    }

    pub async fn update_preferences(&self, update: &PreferenceUpdate) -> Result<PreferenceSet, ClientError> {
        let url = self.config.url("/preferences");
        self.json(self.authed(self.http.put(url)).json(update)).await
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.header("Authorization", format!("Bearer {}", self.config.token))
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let resp = check(builder.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Map a non-success response onto a typed error.
async fn check(resp: Response) -> Result<Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    Err(error_from_body(status, &body))
}

fn error_from_body(status: StatusCode, body: &str) -> ClientError {
    let parsed: Option<ErrorBody> = serde_json::from_str(body).ok();

    if status == StatusCode::UNPROCESSABLE_ENTITY {
        if let Some(kind) = parsed
            .as_ref()
            .and_then(|b| b.code.as_deref())
            .and_then(ViolationKind::from_code)
        {
            return ClientError::Rejected(kind);
        }
    }

    ClientError::Status {
        status: status.as_u16(),
        message: parsed.map(|b| b.error).unwrap_or_else(|| body.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejection_codes_map_to_violations() {
        let err = error_from_body(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"error":"no links","code":"blocked_link"}"#,
        );
        assert!(matches!(err, ClientError::Rejected(ViolationKind::Link)));
        assert!(!err.is_transport());

        let err = error_from_body(StatusCode::BAD_REQUEST, r#"{"error":"message is empty"}"#);
        match err {
            ClientError::Status { status, message } => {
                assert_eq!(status, 400);
                assert_eq!(message, "message is empty");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = error_from_body(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(err.is_transport());
    }

    #[test]
    fn send_request_carries_client_ref() {
        let mut tracker = crate::tracker::DeliveryTracker::new(chrono::Duration::seconds(15));
        let pending = tracker.begin(Uuid::new_v4(), Uuid::new_v4(), None, "hello".into(), chrono::Utc::now());
        let req = send_request(&pending);
        assert_eq!(req.client_ref, pending.client_ref);
        assert_eq!(req.to_user_id, pending.to_user_id);
        assert_eq!(req.content, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_send_times_out() {
        let result: Result<Message, ClientError> =
            with_timeout(Duration::from_secs(15), std::future::pending()).await;
        assert!(matches!(result, Err(ClientError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn prompt_send_is_returned() {
        let result = with_timeout(Duration::from_secs(15), async { Ok::<_, ClientError>(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
