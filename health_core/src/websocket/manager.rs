use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};
use uuid::Uuid;
use axum::extract::ws::{WebSocket, Message};
use futures_util::{SinkExt, StreamExt};
use tracing::{info, warn, error, debug};
use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};
use crate::health::MessageHub;
use crate::websocket::messages::HubMessage;

#[derive(Debug)]
pub struct HubConnection {
    pub id: Uuid,
    pub endpoint: Option<String>,
    pub connected_at: DateTime<Utc>,
    pub sender: mpsc::UnboundedSender<HubMessage>,
}

impl HubConnection {
    pub fn new(endpoint: Option<String>, sender: mpsc::UnboundedSender<HubMessage>) -> Self {
        Self {
            id: Uuid::new_v4(),
            endpoint,
            connected_at: Utc::now(),
            sender,
        }
    }

    pub fn send(&self, message: HubMessage) -> Result<()> {
        self.sender.send(message)
            .map_err(|_| AppError::WebSocket("Failed to send message to connection".to_string()))?;
        Ok(())
    }
}

/// Registry of live realtime clients.
#[derive(Debug, Clone)]
pub struct RealtimeHub {
    connections: Arc<RwLock<HashMap<Uuid, HubConnection>>>,
    max_connections: usize,
}

impl RealtimeHub {
    pub fn new(max_connections: usize) -> Self {
        Self {
            connections: Arc::new(RwLock::new(HashMap::new())),
            max_connections,
        }
    }

    pub async fn add_connection(&self, connection: HubConnection) -> Result<()> {
        let connection_id = connection.id;
        let mut connections = self.connections.write().await;
        if connections.len() >= self.max_connections {
            return Err(AppError::WebSocket(format!(
                "connection limit of {} reached",
                self.max_connections
            )));
        }
        connections.insert(connection_id, connection);
        info!("Hub connection added: {}", connection_id);
        Ok(())
    }

    pub async fn remove_connection(&self, connection_id: &Uuid) {
        let mut connections = self.connections.write().await;
        if connections.remove(connection_id).is_some() {
            info!("Hub connection removed: {}", connection_id);
        }
    }

    pub async fn register_endpoint(&self, connection_id: &Uuid, endpoint: String) -> bool {
        let mut connections = self.connections.write().await;
        match connections.get_mut(connection_id) {
            Some(connection) => {
                debug!("Connection {} registered endpoint {}", connection_id, endpoint);
                connection.endpoint = Some(endpoint);
                true
            }
            None => false,
        }
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Distinct endpoints with at least one live connection.
    pub async fn connected_endpoints(&self) -> Vec<String> {
        let connections = self.connections.read().await;
        connections
            .values()
            .filter_map(|connection| connection.endpoint.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    pub async fn send_to(&self, connection_id: &Uuid, message: HubMessage) {
        let connections = self.connections.read().await;
        if let Some(connection) = connections.get(connection_id) {
            if connection.send(message).is_err() {
                warn!("Failed to send message to connection: {}", connection_id);
            }
        }
    }

    pub async fn handle_connection(&self, socket: WebSocket, endpoint: Option<String>) -> Result<()> {
        let (mut sender, mut receiver) = socket.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<HubMessage>();

        let connection = HubConnection::new(endpoint, tx);
        let connection_id = connection.id;

        let _ = connection.send(HubMessage::Connected { connection_id });

        self.add_connection(connection).await?;

        let outgoing_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        error!("Failed to serialize hub message: {}", e);
                        continue;
                    }
                };

                if sender.send(Message::Text(json)).await.is_err() {
                    debug!("Hub connection closed, stopping outgoing message handler");
                    break;
                }
            }
        });

        let hub = self.clone();
        let incoming_task = tokio::spawn(async move {
            while let Some(msg) = receiver.next().await {
                match msg {
                    Ok(Message::Text(text)) => match HubMessage::from_json(&text) {
                        Ok(HubMessage::Ping) => hub.send_to(&connection_id, HubMessage::Pong).await,
                        Ok(HubMessage::Register { endpoint }) => {
                            if hub.register_endpoint(&connection_id, endpoint.clone()).await {
                                hub.send_to(&connection_id, HubMessage::Registered { endpoint }).await;
                            }
                        }
                        Ok(_) => debug!("Received unhandled hub message type"),
                        Err(e) => {
                            hub.send_to(&connection_id, HubMessage::Error {
                                message: format!("Invalid message: {}", e),
                            }).await;
                        }
                    },
                    Ok(Message::Close(_)) => {
                        debug!("Hub connection closed by client");
                        break;
                    }
                    Err(e) => {
                        warn!("Hub socket error: {}", e);
                        break;
                    }
                    _ => {}
                }
            }
        });

        tokio::select! {
            _ = outgoing_task => {
                debug!("Outgoing message handler completed");
            }
            _ = incoming_task => {
                debug!("Incoming message handler completed");
            }
        }

        self.remove_connection(&connection_id).await;
        Ok(())
    }
}

#[async_trait::async_trait]
impl MessageHub for RealtimeHub {
    async fn client_count(&self) -> usize {
        self.connection_count().await
    }

    async fn connected_endpoint_count(&self) -> usize {
        self.connected_endpoints().await.len()
    }
}
