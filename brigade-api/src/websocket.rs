use axum::{
    extract::ws::{Message, WebSocket, WebSocketUpgrade},
    extract::{Extension, Query},
    response::Response,
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tracing;

use crate::server::ApiState;

#[derive(Deserialize)]
pub struct WsQuery {
    restaurant_id: String,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<WsQuery>,
    Extension(state): Extension<ApiState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, params.restaurant_id, state))
}

/// Forwards every bus message for the restaurant as one JSON text frame, in
/// publish order, until either side closes. Nothing is replayed: a client
/// that reconnects must refetch current state.
async fn handle_socket(socket: WebSocket, restaurant_id: String, state: ApiState) {
    let channel = state.bus.register(&restaurant_id);
    let connection_id = channel.connection_id;
    let mut bus_receiver = channel.receiver;
    tracing::info!(%connection_id, %restaurant_id, "WebSocket connection established");

    let (mut sender, mut receiver) = socket.split();

    let mut send_task = tokio::spawn(async move {
        while let Some(message) = bus_receiver.recv().await {
            let frame = message.to_json().to_string();
            if sender.send(Message::Text(frame)).await.is_err() {
                break;
            }
        }
    });

    let mut recv_task = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            match message {
                Ok(Message::Close(_)) | Err(_) => break,
                // Dashboards only listen on this socket; anything else they
                // send is ignored.
                Ok(_) => {}
            }
        }
    });

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => send_task.abort(),
    }

    state.bus.unregister(&restaurant_id, connection_id);
    tracing::info!(%connection_id, %restaurant_id, "WebSocket connection closed");
}
