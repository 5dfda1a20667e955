//! WebSocket feed of task updates.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

use pdfxlate_core::task::{Task, TaskEvent, TaskListener, TaskStatus};

use crate::metrics::{WS_CONNECTIONS_ACTIVE, WS_CONNECTIONS_TOTAL, WS_LAG_EVENTS, WS_MESSAGES_SENT};
use crate::state::AppState;

/// Interval between heartbeats on an idle connection.
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

/// WebSocket message sent to clients for real-time updates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// A task was created or changed.
    TaskUpdate {
        task_id: String,
        status: TaskStatus,
        progress: u8,
        stage: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// A task and its outputs were released.
    TaskRemoved { task_id: String },
    /// Server heartbeat (sent periodically to keep connection alive).
    Heartbeat { timestamp: i64 },
}

impl WsMessage {
    fn kind(&self) -> &'static str {
        match self {
            WsMessage::TaskUpdate { .. } => "task_update",
            WsMessage::TaskRemoved { .. } => "task_removed",
            WsMessage::Heartbeat { .. } => "heartbeat",
        }
    }
}

impl From<&Task> for WsMessage {
    fn from(task: &Task) -> Self {
        WsMessage::TaskUpdate {
            task_id: task.id.clone(),
            status: task.status,
            progress: task.progress,
            stage: task.stage.clone(),
            error: task.error.clone(),
        }
    }
}

/// Broadcaster for WebSocket messages using tokio broadcast channel.
#[derive(Debug, Clone)]
pub struct WsBroadcaster {
    sender: broadcast::Sender<WsMessage>,
}

impl WsBroadcaster {
    /// Create a new broadcaster with the given channel capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message to all connected clients.
    pub fn broadcast(&self, msg: WsMessage) {
        // Ignore send errors - they just mean no one is listening
        let _ = self.sender.send(msg);
    }

    /// Subscribe to receive messages.
    pub fn subscribe(&self) -> broadcast::Receiver<WsMessage> {
        self.sender.subscribe()
    }

    pub fn task_updated(&self, task: &Task) {
        self.broadcast(WsMessage::from(task));
    }

    pub fn task_removed(&self, task_id: &str) {
        self.broadcast(WsMessage::TaskRemoved {
            task_id: task_id.to_string(),
        });
    }

    /// Registry listener that forwards every change to this broadcaster.
    pub fn task_listener(&self) -> TaskListener {
        let broadcaster = self.clone();
        Arc::new(move |event: &TaskEvent| match event {
            TaskEvent::Updated(task) => broadcaster.task_updated(task),
            TaskEvent::Removed { task_id } => broadcaster.task_removed(task_id),
        })
    }
}

impl Default for WsBroadcaster {
    fn default() -> Self {
        Self::new(256)
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Handle a single WebSocket connection.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let mut rx = state.ws_broadcaster().subscribe();

    WS_CONNECTIONS_TOTAL.inc();
    WS_CONNECTIONS_ACTIVE.inc();

    info!("WebSocket client connected");

    let send_task = tokio::spawn(async move {
        let mut heartbeat = tokio::time::interval(HEARTBEAT_INTERVAL);
        heartbeat.tick().await;

        loop {
            let msg = tokio::select! {
                result = rx.recv() => match result {
                    Ok(msg) => msg,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("WebSocket client lagged, skipped {} messages", n);
                        WS_LAG_EVENTS.inc();
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Broadcast channel closed");
                        break;
                    }
                },
                _ = heartbeat.tick() => WsMessage::Heartbeat {
                    timestamp: chrono::Utc::now().timestamp(),
                },
            };

            WS_MESSAGES_SENT.with_label_values(&[msg.kind()]).inc();

            match serde_json::to_string(&msg) {
                Ok(json) => {
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        debug!("WebSocket send failed, client disconnected");
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to serialize WsMessage: {}", e);
                }
            }
        }
    });

    // Handle incoming messages from client (ping/pong, close)
    while let Some(result) = receiver.next().await {
        match result {
            Ok(Message::Close(_)) => {
                debug!("WebSocket client requested close");
                break;
            }
            Ok(Message::Text(text)) => {
                debug!("Received text message: {}", text);
            }
            Ok(_) => {}
            Err(e) => {
                warn!("WebSocket receive error: {}", e);
                break;
            }
        }
    }

    send_task.abort();
    WS_CONNECTIONS_ACTIVE.dec();
    info!("WebSocket client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_update_serialization() {
        let mut task = Task::pending("t-1");
        task.status = TaskStatus::Running;
        task.progress = 42;
        task.stage = "Rendering".to_string();

        let json = serde_json::to_value(WsMessage::from(&task)).unwrap();
        assert_eq!(json["type"], "task_update");
        assert_eq!(json["task_id"], "t-1");
        assert_eq!(json["status"], "running");
        assert_eq!(json["progress"], 42);
        assert!(json.get("error").is_none());
    }

    #[tokio::test]
    async fn test_listener_forwards_registry_events() {
        let broadcaster = WsBroadcaster::new(8);
        let mut rx = broadcaster.subscribe();
        let listener = broadcaster.task_listener();

        listener(&TaskEvent::Updated(Task::pending("t-2")));
        listener(&TaskEvent::Removed {
            task_id: "t-2".to_string(),
        });

        let first = rx.recv().await.unwrap();
        assert!(matches!(first, WsMessage::TaskUpdate { ref task_id, status: TaskStatus::Pending, .. } if task_id == "t-2"));
        assert_eq!(
            rx.recv().await.unwrap(),
            WsMessage::TaskRemoved {
                task_id: "t-2".to_string()
            }
        );
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let broadcaster = WsBroadcaster::default();
        broadcaster.task_removed("nobody-listening");
    }
}
