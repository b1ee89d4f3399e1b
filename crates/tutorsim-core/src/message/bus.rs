//! Event bus: actor registry plus a single ordered delivery queue.
//!
//! Senders enqueue onto one unbounded queue, so `send` never blocks. A single
//! dispatcher task pops messages in enqueue order and hands each one to the
//! recipient's bounded inbox with a non-blocking push. Unknown recipients are
//! logged and dropped; failed pushes are reported back to the original sender
//! as an `error` message.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use tutorsim_types::message::{Message, MessageKind};

use super::envelope;
use crate::actor::{ActorHandle, StopOutcome};

/// Errors that can occur during event bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The dispatcher has shut down and the queue no longer accepts messages.
    #[error("event bus is closed")]
    Closed,
}

/// Cheap, cloneable handle for enqueueing messages onto the bus.
#[derive(Clone)]
pub struct BusSender {
    tx: mpsc::UnboundedSender<Message>,
}

impl BusSender {
    /// Wrap a raw queue sender.
    pub fn new(tx: mpsc::UnboundedSender<Message>) -> Self {
        Self { tx }
    }

    /// Enqueue a message. Never blocks.
    pub fn send(&self, message: Message) -> Result<(), BusError> {
        self.tx.send(message).map_err(|_| BusError::Closed)
    }
}

impl fmt::Debug for BusSender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BusSender")
            .field("closed", &self.tx.is_closed())
            .finish()
    }
}

enum Dispatcher {
    Idle(mpsc::UnboundedReceiver<Message>),
    Running(JoinHandle<()>),
    Stopped,
}

/// Central message router shared by all actors of one simulation.
pub struct EventBus {
    /// Registered actors (name -> handle).
    registry: Arc<DashMap<String, Arc<ActorHandle>>>,
    /// Producer side of the delivery queue.
    queue: mpsc::UnboundedSender<Message>,
    dispatcher: Mutex<Dispatcher>,
    shutdown: CancellationToken,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            registry: Arc::new(DashMap::new()),
            queue: tx,
            dispatcher: Mutex::new(Dispatcher::Idle(rx)),
            shutdown: CancellationToken::new(),
        }
    }

    /// Register an actor under its name.
    ///
    /// Registering a name again replaces the previous binding. Messages already
    /// sitting in the old inbox stay there.
    pub fn register(&self, actor: Arc<ActorHandle>) {
        let name = actor.name().to_string();
        if self.registry.insert(name.clone(), actor).is_some() {
            debug!(actor = %name, "replaced existing actor binding");
        } else {
            debug!(actor = %name, "registered actor with event bus");
        }
    }

    /// Remove an actor binding. Returns `true` if the name was registered.
    pub fn unregister(&self, name: &str) -> bool {
        let removed = self.registry.remove(name).is_some();
        if removed {
            debug!(actor = %name, "unregistered actor from event bus");
        }
        removed
    }

    /// Check if an actor name is currently registered.
    pub fn is_registered(&self, name: &str) -> bool {
        self.registry.contains_key(name)
    }

    /// Number of registered actors.
    pub fn registered_count(&self) -> usize {
        self.registry.len()
    }

    /// A sender handle for actors and callers.
    pub fn sender(&self) -> BusSender {
        BusSender::new(self.queue.clone())
    }

    /// Enqueue a message for delivery.
    pub fn send(&self, message: Message) -> Result<(), BusError> {
        self.queue.send(message).map_err(|_| BusError::Closed)
    }

    /// Spawn the dispatcher task. Calling this more than once is a no-op.
    pub async fn start(&self) {
        let mut dispatcher = self.dispatcher.lock().await;
        match std::mem::replace(&mut *dispatcher, Dispatcher::Stopped) {
            Dispatcher::Idle(rx) => {
                let handle = tokio::spawn(dispatch_loop(
                    Arc::clone(&self.registry),
                    rx,
                    self.queue.clone(),
                    self.shutdown.clone(),
                ));
                *dispatcher = Dispatcher::Running(handle);
                info!("event bus dispatcher started");
            }
            running @ Dispatcher::Running(_) => {
                debug!("event bus dispatcher already running");
                *dispatcher = running;
            }
            Dispatcher::Stopped => {
                warn!("event bus was stopped and cannot be restarted");
            }
        }
    }

    /// Stop the dispatcher, waiting at most `timeout` for it to exit.
    ///
    /// Messages still queued are discarded.
    pub async fn stop(&self, timeout: Duration) -> StopOutcome {
        self.shutdown.cancel();
        let mut dispatcher = self.dispatcher.lock().await;
        match std::mem::replace(&mut *dispatcher, Dispatcher::Stopped) {
            Dispatcher::Running(handle) => match tokio::time::timeout(timeout, handle).await {
                Ok(_) => {
                    info!("event bus dispatcher stopped");
                    StopOutcome::Stopped
                }
                Err(_) => {
                    warn!(timeout_ms = timeout.as_millis() as u64, "event bus dispatcher did not stop in time");
                    StopOutcome::TimedOut
                }
            },
            Dispatcher::Idle(_) | Dispatcher::Stopped => StopOutcome::NotRunning,
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("registered_actors", &self.registry.len())
            .field("stopping", &self.shutdown.is_cancelled())
            .finish()
    }
}

async fn dispatch_loop(
    registry: Arc<DashMap<String, Arc<ActorHandle>>>,
    mut queue: mpsc::UnboundedReceiver<Message>,
    requeue: mpsc::UnboundedSender<Message>,
    shutdown: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            next = queue.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };
        route(&registry, &requeue, message);
    }
    debug!("event bus dispatcher exited");
}

/// Hand one message to its recipient's inbox.
fn route(
    registry: &DashMap<String, Arc<ActorHandle>>,
    requeue: &mpsc::UnboundedSender<Message>,
    message: Message,
) {
    // Clone the handle out so the shard lock is not held during the push.
    let Some(actor) = registry.get(&message.recipient).map(|entry| Arc::clone(entry.value()))
    else {
        warn!(
            message_id = %message.id,
            sender = %message.sender,
            recipient = %message.recipient,
            kind = %message.kind,
            "no actor registered for recipient, dropping message"
        );
        return;
    };

    let message_id = message.id;
    let sender = message.sender.clone();
    let kind = message.kind;
    debug!(%message_id, %sender, recipient = actor.name(), %kind, "delivering message");

    if let Err(err) = actor.receive(message) {
        warn!(%message_id, recipient = actor.name(), %kind, error = %err, "delivery failed");
        if kind == MessageKind::Error {
            return;
        }
        let notice = envelope::delivery_failure(&sender, message_id, &err.to_string());
        if requeue.send(notice).is_err() {
            debug!(%message_id, "bus closed before delivery failure could be reported");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
