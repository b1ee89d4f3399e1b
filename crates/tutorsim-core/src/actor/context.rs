//! Per-actor context handed to every handler invocation.

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use tutorsim_types::message::{Message, MessageKind, Payload};

use super::ActorError;
use crate::message::BusSender;

/// The actor's view of the runtime: its name, a bus handle for sending, a
/// private key/value store, and a way to stop its own worker.
///
/// Only the actor's own worker ever touches the context, so the store needs
/// no synchronization.
pub struct ActorContext {
    name: String,
    bus: BusSender,
    state: HashMap<String, serde_json::Value>,
    stop: CancellationToken,
}

impl ActorContext {
    pub fn new(name: impl Into<String>, bus: BusSender) -> Self {
        Self::with_stop_token(name, bus, CancellationToken::new())
    }

    pub(crate) fn with_stop_token(
        name: impl Into<String>,
        bus: BusSender,
        stop: CancellationToken,
    ) -> Self {
        Self {
            name: name.into(),
            bus,
            state: HashMap::new(),
            stop,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a message from this actor and enqueue it on the bus.
    pub fn send(
        &self,
        recipient: &str,
        kind: MessageKind,
        payload: Payload,
        correlation_id: Option<String>,
    ) -> Result<Uuid, ActorError> {
        let message = Message::new(self.name.as_str(), recipient, kind, payload)
            .with_correlation(correlation_id);
        let id = message.id;
        self.bus.send(message)?;
        Ok(id)
    }

    /// Reply to `original`'s sender, keeping its correlation ID.
    pub fn reply(
        &self,
        original: &Message,
        kind: MessageKind,
        payload: Payload,
    ) -> Result<Uuid, ActorError> {
        self.send(&original.sender, kind, payload, original.correlation_id.clone())
    }

    /// Enqueue a fully built message as-is.
    pub fn forward(&self, message: Message) -> Result<(), ActorError> {
        self.bus.send(message)?;
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.state.get(key)
    }

    /// Store a value, returning the previous one.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Option<serde_json::Value> {
        self.state.insert(key.into(), value.into())
    }

    /// Ask the worker to exit once the current handler returns.
    pub fn request_stop(&self) {
        self.stop.cancel();
    }

    pub fn stop_requested(&self) -> bool {
        self.stop.is_cancelled()
    }
}

impl std::fmt::Debug for ActorContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorContext")
            .field("name", &self.name)
            .field("state_keys", &self.state.len())
            .field("stop_requested", &self.stop.is_cancelled())
            .finish()
    }
}
