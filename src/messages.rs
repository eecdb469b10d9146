//! Typed, acknowledged messaging between the control and page contexts

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot};

/// Every message that crosses a context boundary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Message {
    /// Start or stop the sampling loop
    #[serde(rename = "TOGGLE_EXTENSION", rename_all = "camelCase")]
    ToggleExtension { is_enabled: bool },
    /// Apply this gain multiplier to every tracked stream
    #[serde(rename = "SET_VOLUME")]
    SetVolume { volume: f32 },
    /// Settings for `domain` were written
    #[serde(rename = "settingsChanged")]
    SettingsChanged { domain: String },
}

/// Receiver's answer to a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ack {
    pub success: bool,
}

impl Ack {
    pub const OK: Ack = Ack { success: true };
    pub const REJECTED: Ack = Ack { success: false };
}

/// A delivered message waiting for its acknowledgment
#[derive(Debug)]
pub struct Incoming {
    message: Message,
    reply: oneshot::Sender<Ack>,
}

impl Incoming {
    pub fn message(&self) -> &Message {
        &self.message
    }

    /// Split into the message and a reply handle, for handlers that need to
    /// own the message before acknowledging
    pub fn into_parts(self) -> (Message, Responder) {
        (self.message, Responder { reply: self.reply })
    }

    pub fn respond(self, ack: Ack) {
        // The sender may have given up waiting; nothing to do then.
        let _ = self.reply.send(ack);
    }
}

/// Reply half of an [`Incoming`]
#[derive(Debug)]
pub struct Responder {
    reply: oneshot::Sender<Ack>,
}

impl Responder {
    pub fn respond(self, ack: Ack) {
        let _ = self.reply.send(ack);
    }
}

/// Sending half of a context's inbox
#[derive(Debug, Clone)]
pub struct MessageSender {
    tx: mpsc::Sender<Incoming>,
}

impl MessageSender {
    /// Deliver `message` and wait for the receiver to acknowledge it
    pub async fn send(&self, message: Message) -> AppResult<Ack> {
        let (reply, ack) = oneshot::channel();
        self.tx
            .send(Incoming { message, reply })
            .await
            .map_err(|e| AppError::Channel(format!("receiver closed, dropped {:?}", e.0.message)))?;
        ack.await
            .map_err(|_| AppError::Channel("message dropped without acknowledgment".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }

    /// Messages queued in the inbox that the receiver has not taken yet
    pub fn pending(&self) -> usize {
        self.tx.max_capacity() - self.tx.capacity()
    }
}

/// Receiving half of a context's inbox
#[derive(Debug)]
pub struct MessageReceiver {
    rx: mpsc::Receiver<Incoming>,
}

impl MessageReceiver {
    /// Next message in send order, `None` once every sender is gone
    pub async fn recv(&mut self) -> Option<Incoming> {
        self.rx.recv().await
    }
}

/// Create an inbox holding up to `capacity` unacknowledged messages
pub fn channel(capacity: usize) -> (MessageSender, MessageReceiver) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (MessageSender { tx }, MessageReceiver { rx })
}
