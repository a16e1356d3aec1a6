use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "data")]
pub enum HubMessage {
    Connected { connection_id: Uuid },
    /// Sent by a client to bind its connection to an endpoint (e.g. a phone extension).
    Register { endpoint: String },
    Registered { endpoint: String },
    Ping,
    Pong,
    Error { message: String },
}

impl HubMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
