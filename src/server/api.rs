use crate::agent::BotAgent;
use crate::cli::Args;
use crate::error::BotError;
use crate::models::update::{ MessageRequest, MessageResponse, Update };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{ get, post },
    Json,
    Router,
};
use serde_json::json;
use tower_http::cors::{ Any, CorsLayer };
use log::{ info, warn };

#[derive(Clone)]
struct AppState {
    agent: Arc<BotAgent>,
}

pub fn app(agent: Arc<BotAgent>, webhook_path: &str) -> Router {
    let app_state = AppState { agent };

    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route(webhook_path, post(update_handler))
        .route("/api/chat/message", post(message_handler))
        .route("/api/health", get(health_handler))
        .layer(cors)
        .with_state(app_state)
}

pub async fn start_http_server(
    agent: Arc<BotAgent>,
    args: Args
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let addr = args.server_addr.parse::<SocketAddr>()?;
    let router = app(agent, &args.webhook_path);

    if args.enable_tls && args.tls_cert_path.is_some() && args.tls_key_path.is_some() {
        let cert_path = args.tls_cert_path.as_ref().ok_or("Missing TLS certificate path")?;
        let key_path = args.tls_key_path.as_ref().ok_or("Missing TLS key path")?;

        let tls_config = axum_server::tls_rustls::RustlsConfig::from_pem_file(
            cert_path,
            key_path
        ).await?;

        info!("Starting HTTPS server on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config).serve(router.into_make_service()).await?;
    } else {
        info!("Starting HTTP server on: http://{}", addr);
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e|
            format!("Failed to bind HTTP server to {}: {}", addr, e)
        )?;
        axum::serve(listener, router.into_make_service()).await?;
    }

    Ok(())
}

/// Webhook ingress. Malformed payloads are terminal for the request (400,
/// no side effects); everything else is acknowledged with 200 so the
/// platform never disables delivery over downstream trouble.
async fn update_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let update = match serde_json::from_slice::<Update>(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("{}", BotError::InvalidPayload(e.to_string()));
            return StatusCode::BAD_REQUEST;
        }
    };

    state.agent.handle_update(update).await;
    StatusCode::OK
}

/// Direct REST chat: the reply is returned synchronously instead of being
/// delivered through the platform.
async fn message_handler(State(state): State<AppState>, body: Bytes) -> impl IntoResponse {
    let request = match serde_json::from_slice::<MessageRequest>(&body) {
        Ok(request) => request,
        Err(e) => {
            warn!("{}", BotError::InvalidPayload(e.to_string()));
            return (StatusCode::BAD_REQUEST, Json(json!({ "error": "invalid payload" }))).into_response();
        }
    };

    let response = state.agent.process_message(
        request.chat_id,
        &request.username,
        &request.message
    ).await;

    Json(MessageResponse { response }).into_response()
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
