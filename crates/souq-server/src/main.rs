mod config;

use std::sync::Arc;

use axum::{
    Router,
    extract::{Query, State, WebSocketUpgrade},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use souq_api::error::ApiError;
use souq_api::middleware::verify_token;
use souq_api::state::{AppState, AppStateInner};
use souq_db::Database;
use souq_gateway::connection;
use souq_gateway::dispatcher::Dispatcher;

use crate::config::Config;

#[derive(Deserialize)]
struct GatewayQuery {
    token: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "souq=debug,souq_api=debug,souq_gateway=debug,tower_http=debug".into()
            }),
        )
        .init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("FATAL: {:#}", e);
            eprintln!("       Set it in your .env file and restart.");
            std::process::exit(1);
        }
    };

    // Init database
    let db = Arc::new(Database::open(&config.db_path)?);

    // Shared state
    let mut inner = AppStateInner::new(db, Dispatcher::new(), config.jwt_secret.clone());
    inner.internal_token = config.internal_token.clone();
    inner.limits = config.limits;
    let state: AppState = Arc::new(inner);

    let ws_route = Router::new()
        .route("/gateway", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(souq_api::routes(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Souq server listening on {}", config.addr);

    let listener = tokio::net::TcpListener::bind(config.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// GET /gateway?token=...: the token is checked before the upgrade, so the
/// socket handler only ever sees authenticated users.
async fn ws_upgrade(
    State(state): State<AppState>,
    Query(query): Query<GatewayQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    let claims = verify_token(&state.jwt_secret, &query.token)?;

    let dispatcher = state.dispatcher.clone();
    let store = state.message_store();
    Ok(ws
        .on_upgrade(move |socket| {
            connection::handle_connection(socket, dispatcher, store, claims.sub, claims.username)
        })
        .into_response())
}
