use std::time::Duration;

/// Connection settings for a client session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// REST base URL, e.g. `https://souq.example.com`.
    pub base_url: String,
    /// Session token issued by the platform's auth service.
    pub token: String,
    /// Bound on a pending send before it is marked failed.
    pub send_timeout: Duration,
    /// Notification badge refresh interval.
    pub poll_interval: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
            send_timeout: Duration::from_secs(15),
            poll_interval: Duration::from_secs(30),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// WebSocket endpoint with the session token in the query string.
    pub fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/gateway?token={}", ws_base, self.token)
    }
}
