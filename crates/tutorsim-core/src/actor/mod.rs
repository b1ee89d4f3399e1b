//! Actor runtime: per-actor inbox, worker loop, and handler dispatch.
//!
//! Each actor owns a bounded inbox and runs on its own tokio task. The worker
//! drains the inbox serially, so at most one handler of a given actor runs at
//! any time and the actor's state needs no locking.

pub mod context;
pub mod handle;
pub mod handler;

use thiserror::Error;

use tutorsim_types::message::{Message, MessageKind};

use crate::conversation::TrackerError;
use crate::message::BusError;

pub use context::ActorContext;
pub use handle::{ActorHandle, ActorSettings, DeliveryError, StopOutcome};
pub use handler::{HandlerFuture, HandlerTable};

/// A participant that reacts to messages.
///
/// Implementors declare their handlers once; the runtime builds the table
/// when the actor is wrapped in an [`ActorHandle`].
pub trait Actor: Send + Sized + 'static {
    /// Unique name used as the routing address.
    fn name(&self) -> &str;

    /// Register a handler per message kind this actor understands.
    fn register_handlers(table: &mut HandlerTable<Self>);
}

/// Errors returned by message handlers. The worker logs them and moves on.
#[derive(Debug, Error)]
pub enum ActorError {
    #[error("unexpected '{found}' payload for {kind} message")]
    UnexpectedPayload { kind: MessageKind, found: &'static str },

    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Tracker(#[from] TrackerError),

    #[error("{0}")]
    Handler(String),
}

impl ActorError {
    pub fn unexpected(message: &Message) -> Self {
        ActorError::UnexpectedPayload {
            kind: message.kind,
            found: message.payload.variant(),
        }
    }
}
