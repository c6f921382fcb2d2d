//! WebSocket streaming endpoint.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use std::sync::atomic::Ordering;
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, instrument, warn};

use crate::address::same_address;
use crate::api::models::{StreamHello, StreamQuery};
use crate::app_state::AppState;
use crate::feed::FeedEvent;

#[utoipa::path(
    get,
    path = "/api/v1/stream",
    params(StreamQuery),
    responses(
        (status = 101, description = "WebSocket upgrade")
    ),
    tag = "Streaming"
)]
/// WebSocket feed of finished sync passes and oracle reports.
#[instrument(skip(state, ws))]
pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(query): Query<StreamQuery>,
    State(state): State<AppState>,
) -> Response {
    info!(address = ?query.address, "WebSocket connection requested");

    ws.on_upgrade(move |socket| handle_socket(socket, query.address, state))
}

/// Whether `event` passes the connection's address filter.
fn wanted(event: &FeedEvent, filter: Option<&str>) -> bool {
    let Some(filter) = filter else {
        return true;
    };
    match event {
        FeedEvent::Synced(report) => same_address(&report.address, filter),
        FeedEvent::Report(report) => same_address(&report.reporter, filter),
    }
}

async fn handle_socket(mut socket: WebSocket, filter: Option<String>, state: AppState) {
    state.stream_clients.fetch_add(1, Ordering::Relaxed);
    info!(address = ?filter, "WebSocket connection established");

    let hello = StreamHello {
        event_type: "connected".to_string(),
        address: filter.clone(),
        timestamp: chrono::Utc::now().timestamp(),
    };

    if let Ok(json) = serde_json::to_string(&hello) {
        let _ = socket.send(Message::Text(json)).await;
    }

    let mut rx = state.feed.subscribe();

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Ok(event) => {
                    if !wanted(&event, filter.as_deref()) {
                        continue;
                    }
                    if let Ok(json) = serde_json::to_string(&event) {
                        if socket.send(Message::Text(json)).await.is_err() {
                            warn!("Failed to send message, closing connection");
                            break;
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Stream client lagging, events dropped");
                }
                Err(RecvError::Closed) => break,
            },

            Some(Ok(msg)) = socket.recv() => {
                match msg {
                    Message::Close(_) => {
                        info!("Client closed connection");
                        break;
                    }
                    Message::Ping(data) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    _ => {}
                }
            }

            else => break,
        }
    }

    info!(address = ?filter, "WebSocket connection closed");
    state.stream_clients.fetch_sub(1, Ordering::Relaxed);
}
