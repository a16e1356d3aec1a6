//! Line-oriented manager-interface client for the telephony gateway.
//!
//! Requests are `Key: Value` lines terminated by a blank line. Replies carry a
//! `Response:` header and echo the request's `ActionID`; unsolicited event blocks
//! and stale replies from abandoned commands are skipped.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::GatewayConfig;
use crate::error::GatewayError;
use crate::health::{GatewayClient, GatewayResponse};

type Block = HashMap<String, String>;
type Session = BufReader<TcpStream>;

pub struct AmiGatewayClient {
    config: GatewayConfig,
    endpoint: String,
    session: Mutex<Option<Session>>,
    connected: AtomicBool,
    last_contact: parking_lot::Mutex<Option<DateTime<Utc>>>,
    next_action_id: AtomicU64,
}

impl AmiGatewayClient {
    /// Connects, reads the greeting and logs in when credentials are configured.
    pub async fn connect(config: &GatewayConfig) -> Result<Self, GatewayError> {
        let client = Self {
            config: config.clone(),
            endpoint: config.endpoint(),
            session: Mutex::new(None),
            connected: AtomicBool::new(false),
            last_contact: parking_lot::Mutex::new(None),
            next_action_id: AtomicU64::new(1),
        };

        let session = client.open_session().await?;
        *client.session.lock().await = Some(session);
        client.mark_contact();

        Ok(client)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn mark_contact(&self) {
        *self.last_contact.lock() = Some(Utc::now());
        self.connected.store(true, Ordering::SeqCst);
    }

    fn action_id(&self) -> String {
        self.next_action_id.fetch_add(1, Ordering::Relaxed).to_string()
    }

    async fn open_session(&self) -> Result<Session, GatewayError> {
        info!("Connecting to telephony gateway at {}", self.endpoint);
        let connect_timeout = self.config.connect_timeout();

        let stream = tokio::time::timeout(connect_timeout, TcpStream::connect(&self.endpoint))
            .await
            .map_err(|_| GatewayError::Connect(format!("timed out connecting to {}", self.endpoint)))?
            .map_err(|e| GatewayError::Connect(e.to_string()))?;

        let mut session = BufReader::new(stream);
        let mut greeting = String::new();
        let read = tokio::time::timeout(connect_timeout, session.read_line(&mut greeting))
            .await
            .map_err(|_| GatewayError::Connect("no greeting from gateway".to_string()))?
            .map_err(|e| GatewayError::Io(e.to_string()))?;
        if read == 0 {
            return Err(GatewayError::Connect("gateway closed the connection".to_string()));
        }
        debug!("Gateway greeting: {}", greeting.trim_end());

        if !self.config.username.is_empty() {
            let fields = [
                ("Username", self.config.username.as_str()),
                ("Secret", self.config.secret.as_str()),
                ("Events", "off"),
            ];
            let block = tokio::time::timeout(
                connect_timeout,
                exchange(&mut session, "Login", &self.action_id(), &fields),
            )
            .await
            .map_err(|_| GatewayError::Login("no reply to login".to_string()))??;

            let response = parse_response(&block);
            if !response.success {
                return Err(GatewayError::Login(response.error.unwrap_or_default()));
            }
            info!("Logged in to telephony gateway as {}", self.config.username);
        }

        Ok(session)
    }

    /// Runs one action under the command timeout.
    ///
    /// The session is taken out of its slot for the duration of the exchange. If the
    /// exchange fails, times out or is cancelled, the half-read session is dropped
    /// and the next command opens a fresh one.
    async fn execute(&self, action: &str, fields: &[(&str, &str)]) -> Result<GatewayResponse, GatewayError> {
        let mut slot = self.session.lock().await;

        let mut session = match slot.take() {
            Some(session) => session,
            None => match self.open_session().await {
                Ok(session) => {
                    info!("Reconnected to telephony gateway at {}", self.endpoint);
                    session
                }
                Err(e) => {
                    self.connected.store(false, Ordering::SeqCst);
                    return Err(e);
                }
            },
        };

        let action_id = self.action_id();
        let outcome = tokio::time::timeout(
            self.config.command_timeout(),
            exchange(&mut session, action, &action_id, fields),
        )
        .await
        .unwrap_or(Err(GatewayError::Timeout(self.config.command_timeout_ms)));

        match outcome {
            Ok(block) => {
                *slot = Some(session);
                self.mark_contact();
                Ok(parse_response(&block))
            }
            Err(e) => {
                warn!("Dropping gateway session after '{}' failed: {}", action, e);
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }
}

async fn exchange(
    stream: &mut Session,
    action: &str,
    action_id: &str,
    fields: &[(&str, &str)],
) -> Result<Block, GatewayError> {
    let mut request = format!("Action: {}\r\nActionID: {}\r\n", action, action_id);
    for (key, value) in fields {
        request.push_str(&format!("{}: {}\r\n", key, value));
    }
    request.push_str("\r\n");

    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| GatewayError::Io(e.to_string()))?;
    stream.flush().await.map_err(|e| GatewayError::Io(e.to_string()))?;

    loop {
        let block = read_block(stream).await?;
        if !block.contains_key("Response") {
            continue;
        }
        if block.get("ActionID").is_some_and(|id| id != action_id) {
            debug!("Skipping stale gateway reply for action {:?}", block.get("ActionID"));
            continue;
        }
        return Ok(block);
    }
}

async fn read_block(stream: &mut Session) -> Result<Block, GatewayError> {
    let mut block = Block::new();
    let mut line = String::new();

    loop {
        line.clear();
        let read = stream
            .read_line(&mut line)
            .await
            .map_err(|e| GatewayError::Io(e.to_string()))?;
        if read == 0 {
            return Err(GatewayError::Io("connection closed by gateway".to_string()));
        }

        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed.is_empty() {
            if block.is_empty() {
                continue;
            }
            return Ok(block);
        }

        match trimmed.split_once(':') {
            Some((key, value)) => {
                block.insert(key.trim().to_string(), value.trim().to_string());
            }
            None => return Err(GatewayError::Protocol(format!("unexpected line '{}'", trimmed))),
        }
    }
}

fn parse_response(block: &Block) -> GatewayResponse {
    let response = block.get("Response").map(String::as_str).unwrap_or_default();
    let success = response.eq_ignore_ascii_case("success") || response.eq_ignore_ascii_case("pong");

    GatewayResponse {
        success,
        error: (!success).then(|| {
            block
                .get("Message")
                .cloned()
                .unwrap_or_else(|| format!("gateway responded '{}'", response))
        }),
    }
}

#[async_trait::async_trait]
impl GatewayClient for AmiGatewayClient {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn last_contact(&self) -> Option<DateTime<Utc>> {
        *self.last_contact.lock()
    }

    async fn send_command(&self, action: &str) -> Result<GatewayResponse, GatewayError> {
        self.execute(action, &[]).await
    }

    async fn reconnect(&self) -> Result<(), GatewayError> {
        let mut slot = self.session.lock().await;
        if slot.is_none() {
            *slot = Some(self.open_session().await?);
            info!("Reconnected to telephony gateway at {}", self.endpoint);
        }
        self.mark_contact();
        Ok(())
    }
}
