//! Telephony WebSocket endpoint
//!
//! Each upgraded connection gets its own session bridge task. The socket is
//! split: a writer task serializes outbound commands so a slow transport
//! send never blocks frame parsing, and the reader loop feeds parsed frames
//! (malformed ones included) to the session.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

use callbridge_session::{parse_frame, SessionBridge, TransportCommand, TransportFrame};

use crate::state::AppState;

const CHANNEL_CAPACITY: usize = 256;

/// Upgrade handler for `/ws/media`.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let call_id = Uuid::new_v4().to_string();
    info!(call_id = %call_id, "Telephony stream connected");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let (frame_tx, frame_rx) = mpsc::channel::<TransportFrame>(CHANNEL_CAPACITY);
    let (command_tx, mut command_rx) = mpsc::channel::<TransportCommand>(CHANNEL_CAPACITY);

    let bridge = SessionBridge::new(
        call_id.clone(),
        state.settings.clone(),
        state.connector.clone(),
        state.agent_breaker(),
        state.dispatcher.clone(),
        state.summaries.clone(),
        command_tx,
    );
    let session = tokio::spawn(bridge.run(frame_rx));

    let writer_call_id = call_id.clone();
    let writer = tokio::spawn(async move {
        while let Some(command) = command_rx.recv().await {
            let text = match serde_json::to_string(&command) {
                Ok(text) => text,
                Err(e) => {
                    warn!(call_id = %writer_call_id, error = %e, "Unserializable transport command");
                    continue;
                }
            };
            if ws_tx.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
        let _ = ws_tx.close().await;
    });

    while let Some(message) = ws_rx.next().await {
        match message {
            Ok(Message::Text(text)) => {
                if frame_tx.send(parse_frame(&text)).await.is_err() {
                    break;
                }
            }
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                warn!(call_id = %call_id, error = %e, "Telephony socket error");
                break;
            }
        }
    }

    // Closing the frame channel lets the session observe transport closure.
    drop(frame_tx);
    let _ = session.await;
    writer.abort();
    info!(call_id = %call_id, "Telephony stream closed");
}
