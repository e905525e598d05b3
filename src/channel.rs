use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Outbound `send_message` payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub message: String,
}

/// Inbound `receive_message` payload. Error and message are mutually
/// exclusive in practice; a payload carrying neither is rendered as nothing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IncomingPayload {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl IncomingPayload {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            error: None,
            message: Some(text.into()),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            error: Some(text.into()),
            message: None,
        }
    }
}

/// The already-connected real-time channel the chat relay writes to.
///
/// Injected into [`crate::app::App`] so tests can substitute a recording
/// fake. Connection lifecycle is the transport's concern, not the relay's:
/// there is no retry, timeout, or acknowledgement tracking on this side.
pub trait ChatTransport: Send + Sync {
    fn send_message(&self, payload: OutgoingMessage) -> Result<()>;
}

/// Production transport: hands outgoing payloads to the in-process bot task.
/// Replies come back through the event loop as `AppEvent::Channel`.
pub struct BotChannel {
    tx: mpsc::UnboundedSender<OutgoingMessage>,
}

impl BotChannel {
    pub fn new(tx: mpsc::UnboundedSender<OutgoingMessage>) -> Self {
        Self { tx }
    }
}

impl ChatTransport for BotChannel {
    fn send_message(&self, payload: OutgoingMessage) -> Result<()> {
        self.tx
            .send(payload)
            .map_err(|_| anyhow!("chat channel closed"))
    }
}

/// Transport fake that records every payload it is asked to send.
#[cfg(test)]
#[derive(Default)]
pub struct RecordingTransport {
    sent: std::sync::Mutex<Vec<OutgoingMessage>>,
}

#[cfg(test)]
impl RecordingTransport {
    pub fn new() -> std::sync::Arc<Self> {
        std::sync::Arc::new(Self::default())
    }

    pub fn sent(&self) -> Vec<OutgoingMessage> {
        self.sent.lock().unwrap().clone()
    }
}

#[cfg(test)]
impl ChatTransport for RecordingTransport {
    fn send_message(&self, payload: OutgoingMessage) -> Result<()> {
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }
}
