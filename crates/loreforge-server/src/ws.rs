//! The optional WebSocket observer.
//!
//! Clients connect to `GET /ws/events` and receive every bus event as a
//! JSON text frame, in emission order. A client that falls behind skips
//! ahead to the newest events rather than back-pressuring the engine.

use std::sync::Arc;

use axum::Router;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::IntoResponse;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

use loreforge_tools::EngineState;

/// Build the observer router.
///
/// CORS allows any origin for development tooling; the observer is
/// read-only.
pub fn build_router(state: Arc<EngineState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ws/events", get(ws_events))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Upgrade to a WebSocket and start streaming events.
async fn ws_events(
    ws: WebSocketUpgrade,
    State(state): State<Arc<EngineState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_ws(socket, state))
}

/// Forward bus events until either side hangs up.
async fn handle_ws(mut socket: WebSocket, state: Arc<EngineState>) {
    debug!("observer client connected");
    let mut events = state.bus().subscribe();

    loop {
        tokio::select! {
            received = events.recv() => {
                match received {
                    Ok(event) => {
                        let json = match serde_json::to_string(&event) {
                            Ok(json) => json,
                            Err(e) => {
                                warn!("failed to serialize event: {e}");
                                continue;
                            }
                        };
                        if socket.send(Message::Text(json.into())).await.is_err() {
                            debug!("observer client disconnected");
                            return;
                        }
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        debug!(skipped, "observer client lagged, skipping ahead");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => {
                        debug!("event bus closed, observer shutting down");
                        return;
                    }
                }
            }
            inbound = socket.recv() => {
                match inbound {
                    Some(Ok(Message::Close(_))) | None => {
                        debug!("observer client closed the connection");
                        return;
                    }
                    Some(Ok(_)) => {} // Observer input is ignored.
                    Some(Err(e)) => {
                        debug!("observer socket error: {e}");
                        return;
                    }
                }
            }
        }
    }
}

/// Bind and serve the observer in a background task.
pub async fn spawn(state: Arc<EngineState>, bind_addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    let router = build_router(state);
    tracing::info!(addr = %bind_addr, "observer listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, router).await {
            warn!("observer server stopped: {e}");
        }
    });
    Ok(())
}
