use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, bail};

use souq_api::state::Limits;

const PLACEHOLDER_SECRETS: &[&str] = &[
    "change-me-to-a-random-string",
    "dev-secret-change-me",
];

/// Process configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub db_path: PathBuf,
    pub jwt_secret: String,
    pub internal_token: Option<String>,
    pub limits: Limits,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let jwt_secret = get("SOUQ_JWT_SECRET").unwrap_or_default();
        if jwt_secret.is_empty() || PLACEHOLDER_SECRETS.contains(&jwt_secret.as_str()) {
            bail!("SOUQ_JWT_SECRET is unset or still a placeholder; it must match the auth service's secret");
        }

        let host = get("SOUQ_HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = get("SOUQ_PORT")
            .unwrap_or_else(|| "3000".into())
            .parse()
            .context("SOUQ_PORT must be a port number")?;
        let addr: SocketAddr = format!("{}:{}", host, port)
            .parse()
            .context("SOUQ_HOST must be an IP address")?;

        let db_path: PathBuf = get("SOUQ_DB_PATH").unwrap_or_else(|| "souq.db".into()).into();
        let internal_token = get("SOUQ_INTERNAL_TOKEN").filter(|t| !t.is_empty());

        let defaults = Limits::default();
        let limit = |key: &str, default: u32| {
            get(key)
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(default)
                .max(1)
        };
        let limits = Limits {
            notification_preview: limit("SOUQ_NOTIFICATION_PREVIEW_LIMIT", defaults.notification_preview),
            notification_max: limit("SOUQ_NOTIFICATION_MAX_LIMIT", defaults.notification_max),
            conversation: limit("SOUQ_CONVERSATION_LIMIT", defaults.conversation),
        };

        Ok(Self {
            addr,
            db_path,
            jwt_secret,
            internal_token,
            limits,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn placeholder_secret_is_refused() {
        assert!(Config::from_lookup(lookup(&[])).is_err());
        assert!(Config::from_lookup(lookup(&[("SOUQ_JWT_SECRET", "dev-secret-change-me")])).is_err());
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("SOUQ_JWT_SECRET", "s3cret")])).unwrap();
        assert_eq!(config.addr, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert_eq!(config.db_path, PathBuf::from("souq.db"));
        assert_eq!(config.internal_token, None);
        assert_eq!(config.limits.notification_preview, 5);
        assert_eq!(config.limits.notification_max, 200);
    }

    #[test]
    fn limits_are_floored_at_one() {
        let config = Config::from_lookup(lookup(&[
            ("SOUQ_JWT_SECRET", "s3cret"),
            ("SOUQ_NOTIFICATION_PREVIEW_LIMIT", "0"),
            ("SOUQ_CONVERSATION_LIMIT", "50"),
            ("SOUQ_INTERNAL_TOKEN", "svc"),
        ]))
        .unwrap();
        assert_eq!(config.limits.notification_preview, 1);
        assert_eq!(config.limits.conversation, 50);
        assert_eq!(config.internal_token.as_deref(), Some("svc"));
    }
}
