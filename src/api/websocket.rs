// SPDX-License-Identifier: GPL-3.0-only
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use axum::Json;
use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::api::handlers::{ApiHandlers, ApiResponse, ApiResult, ConnectivityReport};
use crate::queue::ActionRequest;

/// Messages a UI window sends over its socket
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WsMessage {
    Register { url: String },
    Connectivity { online: bool },
    Submit { request: ActionRequest },
    QueueCount,
    Sync,
}

#[derive(Debug, Serialize, Deserialize)]
struct WsResponse {
    success: bool,
    data: Option<serde_json::Value>,
    error: Option<String>,
}

impl WsResponse {
    fn from_api<T: Serialize>(response: ApiResponse<T>) -> Self {
        Self {
            success: response.success,
            data: response.data.map(|v| serde_json::to_value(v).unwrap_or_default()),
            error: response.error,
        }
    }

    fn from_result<T: Serialize>(result: ApiResult<T>) -> Self {
        match result {
            Ok(Json(response)) => Self::from_api(response),
            Err((_, Json(response))) => Self::from_api(response),
        }
    }
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(handlers): State<Arc<ApiHandlers>>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, handlers))
}

async fn handle_socket(socket: WebSocket, handlers: Arc<ApiHandlers>) {
    let window_id = Uuid::new_v4().to_string();
    let (sender, mut receiver) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel();

    info!(window_id = %window_id, "UI window connected");

    let mut send_task = tokio::spawn(async move {
        let mut sender = sender;
        while let Some(msg) = rx.recv().await {
            if let Err(e) = sender.send(msg).await {
                error!(error = %e, "Failed to send WebSocket message");
                break;
            }
        }
    });

    let mut events = handlers.hub().subscribe();
    let events_tx = tx.clone();
    let events_window = window_id.clone();
    let mut event_task = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => {
                    if !event.is_for(&events_window) {
                        continue;
                    }
                    let text = match serde_json::to_string(&event) {
                        Ok(text) => text,
                        Err(e) => {
                            error!(error = %e, "Failed to encode event");
                            continue;
                        }
                    };
                    if events_tx.send(Message::Text(text)).is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(window_id = %events_window, skipped, "Window fell behind, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    });

    let handlers_clone = Arc::clone(&handlers);
    let recv_window = window_id.clone();
    let mut recv_task = tokio::spawn(async move {
        while let Some(Ok(msg)) = receiver.next().await {
            match msg {
                Message::Text(text) => {
                    if let Err(e) = handle_message(text, &handlers_clone, &recv_window, &tx).await {
                        error!(error = %e, "Failed to handle WebSocket message");
                    }
                }
                Message::Close(_) => {
                    debug!(window_id = %recv_window, "WebSocket close frame received");
                    break;
                }
                _ => {}
            }
        }
    });

    tokio::select! {
        _ = (&mut send_task) => {
            recv_task.abort();
            event_task.abort();
        }
        _ = (&mut recv_task) => {
            send_task.abort();
            event_task.abort();
        }
        _ = (&mut event_task) => {
            send_task.abort();
            recv_task.abort();
        }
    };

    handlers.hub().unregister_window(&window_id);
    info!(window_id = %window_id, "UI window disconnected");
}

async fn handle_message(
    text: String,
    handlers: &ApiHandlers,
    window_id: &str,
    tx: &mpsc::UnboundedSender<Message>,
) -> anyhow::Result<()> {
    let msg: WsMessage = match serde_json::from_str(&text) {
        Ok(m) => m,
        Err(e) => {
            let response = WsResponse {
                success: false,
                data: None,
                error: Some(format!("Invalid message format: {}", e)),
            };
            tx.send(Message::Text(serde_json::to_string(&response)?))?;
            return Ok(());
        }
    };

    let response = match msg {
        WsMessage::Register { url } => {
            handlers.hub().register_window(window_id, &url);
            debug!(window_id = %window_id, url = %url, "Window registered");
            WsResponse::from_api(ApiResponse::success(serde_json::json!({ "window_id": window_id })))
        }
        WsMessage::Connectivity { online } => {
            let Json(response) = handlers.report_connectivity(ConnectivityReport { online });
            WsResponse::from_api(response)
        }
        WsMessage::Submit { request } => WsResponse::from_result(handlers.submit_request(request).await),
        WsMessage::QueueCount => WsResponse::from_result(handlers.queue_count().await),
        WsMessage::Sync => WsResponse::from_result(handlers.trigger_sync().await),
    };

    tx.send(Message::Text(serde_json::to_string(&response)?))?;
    Ok(())
}
