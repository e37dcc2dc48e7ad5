use crate::relay::ChatRelay;
use axum::{
    body::{ Body, Bytes },
    extract::State,
    http::header,
    response::{ IntoResponse, Response },
    routing::{ get, post },
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use log::{ error, info };
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{ Any, CorsLayer };

#[derive(Clone)]
struct AppState {
    relay: Arc<ChatRelay>,
}

/// PEM certificate and key paths for serving HTTPS.
#[derive(Debug, Clone)]
pub struct TlsPaths {
    pub cert_path: String,
    pub key_path: String,
}

pub fn router(relay: Arc<ChatRelay>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(health_check))
        .route("/api/chat", post(chat_handler))
        .layer(cors)
        .with_state(AppState { relay })
}

pub async fn start_http_server(
    addr: SocketAddr,
    relay: Arc<ChatRelay>,
    tls: Option<TlsPaths>
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let app = router(relay);

    if let Some(tls) = tls {
        let tls_config = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        let handle = axum_server::Handle::new();
        let shutdown_handle = handle.clone();
        tokio::spawn(async move {
            shutdown_signal().await;
            shutdown_handle.graceful_shutdown(Some(Duration::from_secs(5)));
        });

        info!("HTTPS server listening on: https://{}", addr);
        axum_server::bind_rustls(addr, tls_config).handle(handle).serve(app.into_make_service()).await?;
    } else {
        let listener = tokio::net::TcpListener::bind(addr).await.map_err(|e| {
            error!("Failed to bind HTTP server to {}: {}. Try a different port.", addr, e);
            e
        })?;
        info!("HTTP server listening on: http://{}", addr);
        axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown signal received, draining connections...");
}

async fn health_check() -> &'static str {
    "Arcanea is running"
}

async fn chat_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.relay.handle(&body).await {
        Ok(stream) =>
            (
                [
                    (header::CONTENT_TYPE, "text/plain; charset=utf-8"),
                    (header::CACHE_CONTROL, "no-cache"),
                ],
                Body::from_stream(stream),
            ).into_response(),
        Err(e) => {
            error!("Chat API error: {}", e);
            e.into_response()
        }
    }
}
