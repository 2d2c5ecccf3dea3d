//! Registration hand-off.
//!
//! `/@join` does not provision accounts. It validates the request, then
//! publishes a [`UserJoined`] event; an external consumer owns the actual
//! account creation. The service's contract ends once the sink accepts the
//! event.

use anyhow::Result;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Debug, Clone, Serialize)]
pub struct UserJoined {
    pub id: String,
    pub email: String,
    pub name: String,
    pub data: Value,
    pub allowed_scopes: Vec<String>,
    pub validation_token: String,
}

/// Outbound edge of registration.
pub trait JoinSink: Send + Sync {
    /// Publish one event.
    ///
    /// # Errors
    /// Returns an error when the event cannot be handed off.
    fn publish(&self, event: UserJoined) -> Result<()>;
}

pub type SharedJoinSink = Arc<dyn JoinSink>;

/// Channel-backed sink; the receiving side is the provisioning consumer.
pub struct ChannelJoinSink {
    tx: mpsc::UnboundedSender<UserJoined>,
}

impl ChannelJoinSink {
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<UserJoined>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl JoinSink for ChannelJoinSink {
    fn publish(&self, event: UserJoined) -> Result<()> {
        self.tx
            .send(event)
            .map_err(|_| anyhow::anyhow!("join sink closed"))
    }
}

/// Drain events into the log until a real provisioning consumer is attached.
pub fn spawn_log_drain(mut rx: mpsc::UnboundedReceiver<UserJoined>) {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            info!(id = %event.id, email = %event.email, "user joined");
        }
    });
}
