pub mod handler;
pub mod manager;
pub mod messages;


pub use handler::websocket_handler;
pub use manager::{HubConnection, RealtimeHub};
pub use messages::HubMessage;
