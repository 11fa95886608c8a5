// src/handlers/realtime.rs

use axum::{
    extract::{
        ws::{Message as WsMessage, WebSocket},
        State, WebSocketUpgrade,
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};

use crate::config::AppState;

// GET /api/realtime
// Feed de eventos ao vivo: envelope { type, data }, sem números de
// sequência e sem replay. Cliente que perdeu eventos refaz o estado
// pelo REST ao reconectar.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(app_state): State<AppState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, app_state))
}

async fn handle_socket(socket: WebSocket, app_state: AppState) {
    let (client_id, mut rx) = app_state.realtime.register().await;
    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Bomba o canal do hub para o socket
    let send_task = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(WsMessage::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    // O feed é só de saída; lemos apenas para detectar o fechamento
    while let Some(Ok(message)) = ws_receiver.next().await {
        if let WsMessage::Close(_) = message {
            break;
        }
    }

    app_state.realtime.unregister(client_id).await;
    send_task.abort();
}
