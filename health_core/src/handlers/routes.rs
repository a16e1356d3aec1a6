//! Route table

use crate::{
    handlers::health::{handle_fast_health, handle_full_health},
    websocket::websocket_handler,
    AppState,
};
use axum::{routing::get, Router};

pub fn create_routes() -> Router<AppState> {
    Router::new()
        .route("/api/system/health", get(handle_full_health))
        .route("/api/system/health/fast", get(handle_fast_health))
        .route("/ws", get(websocket_handler))
}
