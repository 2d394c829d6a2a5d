use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use souq_types::events::{GatewayCommand, GatewayEvent};

use crate::config::ClientConfig;
use crate::http::ClientError;

/// Decode one server frame. Unknown shapes are dropped.
pub fn parse_event(text: &str) -> Option<GatewayEvent> {
    match serde_json::from_str(text) {
        Ok(event) => Some(event),
        Err(e) => {
            debug!("Ignoring unrecognised gateway frame: {}", e);
            None
        }
    }
}

/// Live connection to the gateway. Pushes are best-effort: anything missed
/// while disconnected is recovered by the next fetch.
pub struct RealtimeClient {
    events: mpsc::UnboundedReceiver<GatewayEvent>,
    commands: mpsc::UnboundedSender<GatewayCommand>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl RealtimeClient {
    pub async fn connect(config: &ClientConfig) -> Result<Self, ClientError> {
        let (ws_stream, _) = connect_async(config.gateway_url()).await?;
        info!("Gateway connected to {}", config.base_url);

        let (mut write, mut read) = ws_stream.split();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (commands, mut command_rx) = mpsc::unbounded_channel::<GatewayCommand>();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => {
                        let _ = write.send(WsMessage::Close(None)).await;
                        break;
                    }
                    Some(cmd) = command_rx.recv() => {
                        let json = match serde_json::to_string(&cmd) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("Failed to encode gateway command: {}", e);
                                continue;
                            }
                        };
                        if write.send(WsMessage::Text(json.into())).await.is_err() {
                            break;
                        }
                    }
                    frame = read.next() => match frame {
                        Some(Ok(WsMessage::Text(text))) => {
                            if let Some(event) = parse_event(text.as_str()) {
                                if event_tx.send(event).is_err() {
                                    break;
                                }
                            }
                        }
                        Some(Ok(WsMessage::Ping(data))) => {
                            if write.send(WsMessage::Pong(data)).await.is_err() {
                                break;
                            }
                        }
                        Some(Ok(WsMessage::Close(_))) | None => break,
                        Some(Ok(_)) => {}
                        Some(Err(e)) => {
                            warn!("Gateway connection error: {}", e);
                            break;
                        }
                    },
                }
            }
            info!("Gateway connection closed");
        });

        Ok(Self {
            events,
            commands,
            cancel,
            task,
        })
    }

    /// Next pushed event, or `None` once the connection is gone.
    pub async fn next_event(&mut self) -> Option<GatewayEvent> {
        self.events.recv().await
    }

    /// Confirm receipt of messages addressed to this user.
    pub fn ack(&self, message_ids: Vec<Uuid>) -> bool {
        if message_ids.is_empty() {
            return true;
        }
        self.commands.send(GatewayCommand::Ack { message_ids }).is_ok()
    }

    pub async fn close(self) {
        self.cancel.cancel();
        let _ = self.task.await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use souq_types::models::DeliveryStatus;

    #[test]
    fn parses_known_frames_only() {
        let id = Uuid::new_v4();
        let frame = format!(
            r#"{{"type":"delivery_status","message_id":"{}","delivery_status":"delivered"}}"#,
            id
        );
        assert_eq!(
            parse_event(&frame),
            Some(GatewayEvent::DeliveryStatus {
                message_id: id,
                delivery_status: DeliveryStatus::Delivered,
            })
        );
        assert_eq!(parse_event(r#"{"type":"ready","user_id":"x"}"#), None);
        assert_eq!(parse_event("not json"), None);
    }
}
