//! Outbound WebSocket client for the speech-agent peer
//!
//! `AgentConnector` is the seam the session bridge sees: a connect attempt
//! either yields a pair of channels (events in, commands out) or a
//! classified error. The real connector speaks WebSocket underneath, with a
//! reader and a writer task bridging the socket to the channels.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, warn};

use callbridge_config::AgentConfig;

use crate::agent::{AgentCommand, AgentEvent};

const CHANNEL_CAPACITY: usize = 256;

/// Speech-agent connection failures, classified for retry purposes.
///
/// Only recoverable failures count toward breaker-gated retry; an
/// authentication rejection will not get better on the next attempt.
#[derive(Error, Debug)]
pub enum ConnectError {
    #[error("Connect timed out after {0:?}")]
    Timeout(Duration),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Connection failed: {0}")]
    Transport(String),
}

impl ConnectError {
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, ConnectError::AuthRejected(_))
    }
}

/// Channel pair for one established agent connection
pub struct AgentChannels {
    /// Events read off the socket, in receipt order.
    pub events: mpsc::Receiver<AgentEvent>,
    /// Commands to serialize onto the socket. Dropping this sender closes
    /// the connection.
    pub commands: mpsc::Sender<AgentCommand>,
}

/// Connection factory for the speech-agent peer
#[async_trait]
pub trait AgentConnector: Send + Sync {
    async fn connect(&self, call_id: &str) -> Result<AgentChannels, ConnectError>;
}

/// Production connector speaking JSON-over-WebSocket
pub struct WsAgentConnector {
    config: AgentConfig,
}

impl WsAgentConnector {
    pub fn new(config: AgentConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl AgentConnector for WsAgentConnector {
    async fn connect(&self, call_id: &str) -> Result<AgentChannels, ConnectError> {
        let mut request = self
            .config
            .endpoint
            .as_str()
            .into_client_request()
            .map_err(|e| ConnectError::Transport(e.to_string()))?;

        let auth = HeaderValue::from_str(&format!("Token {}", self.config.api_key))
            .map_err(|_| ConnectError::AuthRejected("API key is not a valid header".into()))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let connect_timeout = Duration::from_secs(self.config.connect_timeout_secs);
        let (socket, _response) = tokio::time::timeout(connect_timeout, connect_async(request))
            .await
            .map_err(|_| ConnectError::Timeout(connect_timeout))?
            .map_err(classify_ws_error)?;

        debug!(call_id = %call_id, endpoint = %self.config.endpoint, "Agent connected");

        let (mut sink, mut stream) = socket.split();
        let (event_tx, event_rx) = mpsc::channel::<AgentEvent>(CHANNEL_CAPACITY);
        let (command_tx, mut command_rx) = mpsc::channel::<AgentCommand>(CHANNEL_CAPACITY);

        let writer_call_id = call_id.to_string();
        tokio::spawn(async move {
            while let Some(command) = command_rx.recv().await {
                let text = match serde_json::to_string(&command) {
                    Ok(text) => text,
                    Err(e) => {
                        warn!(call_id = %writer_call_id, error = %e, "Unserializable agent command");
                        continue;
                    }
                };
                if sink.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
            let _ = sink.send(Message::Close(None)).await;
        });

        let reader_call_id = call_id.to_string();
        tokio::spawn(async move {
            while let Some(message) = stream.next().await {
                let event = match message {
                    Ok(Message::Text(text)) => match serde_json::from_str::<AgentEvent>(&text) {
                        Ok(event) => event,
                        Err(e) => {
                            warn!(call_id = %reader_call_id, error = %e, "Unparseable agent message");
                            continue;
                        }
                    },
                    // Raw binary audio fallback, normalized to the JSON shape.
                    Ok(Message::Binary(data)) => AgentEvent::ConversationAudio {
                        audio: BASE64.encode(&data),
                    },
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!(call_id = %reader_call_id, error = %e, "Agent socket error");
                        break;
                    }
                };
                if event_tx.send(event).await.is_err() {
                    break;
                }
            }
            debug!(call_id = %reader_call_id, "Agent reader finished");
        });

        Ok(AgentChannels {
            events: event_rx,
            commands: command_tx,
        })
    }
}

fn classify_ws_error(error: WsError) -> ConnectError {
    match error {
        WsError::Http(response) if response.status().as_u16() == 401 || response.status().as_u16() == 403 => {
            ConnectError::AuthRejected(response.status().to_string())
        }
        other => ConnectError::Transport(other.to_string()),
    }
}
