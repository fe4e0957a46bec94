//! HTTP surface: `/ws` upgrades to a downstream connection, `/health`
//! reports relay state.

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use pumprelay_hub::{ConnectionHandler, HubError, MessageConnection};
use pumprelay_stream::UpstreamState;
use serde::Serialize;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub handler: ConnectionHandler,
    pub upstream: watch::Receiver<UpstreamState>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_handler(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        state.handler.serve(AxumConnection(socket)).await;
    })
}

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub connections: usize,
    pub topics: usize,
    pub upstream: &'static str,
}

async fn health(State(state): State<AppState>) -> Json<Health> {
    let registry = state.handler.registry();
    Json(Health {
        status: "ok",
        connections: registry.connection_count(),
        topics: registry.topic_count(),
        upstream: state.upstream.borrow().as_str(),
    })
}

/// axum WebSocket as a hub connection. Pings are answered by axum itself.
struct AxumConnection(WebSocket);

#[async_trait]
impl MessageConnection for AxumConnection {
    async fn recv_text(&mut self) -> Option<Result<String, HubError>> {
        loop {
            let msg = match self.0.recv().await? {
                Ok(msg) => msg,
                Err(e) => return Some(Err(HubError::Receive(e.to_string()))),
            };
            match msg {
                Message::Text(text) => return Some(Ok(text)),
                Message::Binary(bytes) => {
                    return Some(String::from_utf8(bytes).map_err(|_| {
                        HubError::InvalidRequest("binary frame is not UTF-8".into())
                    }))
                }
                Message::Close(_) => return None,
                Message::Ping(_) | Message::Pong(_) => continue,
            }
        }
    }

    async fn send_text(&mut self, text: &str) -> Result<(), HubError> {
        self.0
            .send(Message::Text(text.to_owned()))
            .await
            .map_err(|e| HubError::Send(e.to_string()))
    }

    async fn close(&mut self) {
        let _ = self.0.send(Message::Close(None)).await;
    }
}
