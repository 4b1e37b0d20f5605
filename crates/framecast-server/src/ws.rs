use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use framecast_core::{now_ms, EnrichedResult, FrameData};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();
    let client_id = Uuid::new_v4();
    info!("Client connected: {}", client_id);

    // Everything headed for this socket funnels through one channel:
    // relayed signaling from other clients and this client's own
    // detection results.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<String>();
    state.clients.insert(client_id, out_tx.clone());

    let writer = tokio::spawn(async move {
        while let Some(text) = out_rx.recv().await {
            if sender.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    // Result sink handed to the pipeline with each admitted frame.
    let (result_tx, mut result_rx) = mpsc::unbounded_channel::<EnrichedResult>();
    let detections_out = out_tx.clone();
    tokio::spawn(async move {
        while let Some(result) = result_rx.recv().await {
            match serde_json::to_string(&ServerMessage::detections(result)) {
                Ok(text) => {
                    if detections_out.send(text).is_err() {
                        break;
                    }
                }
                Err(e) => error!("Failed to encode detection result: {}", e),
            }
        }
    });

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else {
            continue;
        };

        let message: ClientMessage = match serde_json::from_str(&text) {
            Ok(m) => m,
            Err(e) => {
                error!("JSON parse error: {}", e);
                continue;
            }
        };

        match message {
            ClientMessage::FrameData {
                frame_id,
                capture_ts,
                image_data,
            } => {
                let recv_ts = now_ms();
                let data = FrameData {
                    frame_id: frame_id.unwrap_or_else(|| recv_ts.to_string()),
                    capture_ts: capture_ts.unwrap_or(recv_ts),
                    image_data: image_data.unwrap_or_default(),
                };
                let receipt = state.processor.admit(data, result_tx.clone());
                debug!(
                    "Admitted frame from {} (queue depth {})",
                    client_id, receipt.queue_size
                );
            }
            _ => state.relay_from(client_id, &text),
        }
    }

    state.clients.remove(&client_id);
    drop(result_tx);
    writer.abort();
    info!("Client disconnected: {}", client_id);
}
