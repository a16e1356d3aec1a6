use axum::{
    extract::{
        ws::{WebSocketUpgrade, WebSocket},
        Query, State,
    },
    response::Response,
};
use tracing::{info, warn};

use crate::websocket::manager::RealtimeHub;
use crate::AppState;

#[derive(serde::Deserialize)]
pub struct HubQuery {
    endpoint: Option<String>,
}

pub async fn websocket_handler(
    ws: WebSocketUpgrade,
    Query(params): Query<HubQuery>,
    State(state): State<AppState>,
) -> Response {
    info!("Hub connection request received");

    let hub = match &state.hub {
        Some(hub) => hub.clone(),
        None => {
            warn!("Realtime hub not available");
            return ws.on_upgrade(|_| async {});
        }
    };

    ws.on_upgrade(move |socket| handle_socket(socket, hub, params.endpoint))
}

async fn handle_socket(socket: WebSocket, hub: RealtimeHub, endpoint: Option<String>) {
    info!("Hub connection established");

    if let Err(e) = hub.handle_connection(socket, endpoint).await {
        warn!("Hub connection error: {}", e);
    }

    info!("Hub connection closed");
}
