//! Actor handles: inbox, lifecycle, and the worker loop.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use tutorsim_types::config::RuntimeConfig;
use tutorsim_types::message::Message;

use super::{Actor, ActorContext, HandlerTable};
use crate::message::BusSender;

/// Errors from pushing a message into an actor's inbox.
#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("inbox closed for actor {0}")]
    InboxClosed(String),
}

/// Result of stopping an actor or the bus dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// The worker exited within the deadline.
    Stopped,
    /// The worker was still busy when the deadline passed. It keeps running
    /// detached until its current handler returns.
    TimedOut,
    /// The worker was never started or has already been stopped.
    NotRunning,
}

/// Runtime knobs shared by every actor of a simulation.
#[derive(Debug, Clone, Copy)]
pub struct ActorSettings {
    pub stop_timeout: Duration,
}

impl Default for ActorSettings {
    fn default() -> Self {
        Self::from(&RuntimeConfig::default())
    }
}

impl From<&RuntimeConfig> for ActorSettings {
    fn from(config: &RuntimeConfig) -> Self {
        Self {
            stop_timeout: Duration::from_millis(config.stop_timeout_ms),
        }
    }
}

enum Lifecycle {
    /// Built but not spawned; holds the worker future.
    Idle(BoxFuture<'static, ()>),
    Running(JoinHandle<()>),
    Stopped,
}

/// Routing handle for one actor.
///
/// The actor value itself lives inside the worker task; the handle only keeps
/// the inbox sender and the lifecycle state.
pub struct ActorHandle {
    name: String,
    inbox: mpsc::UnboundedSender<Message>,
    cancel: CancellationToken,
    stop_timeout: Duration,
    lifecycle: Mutex<Lifecycle>,
}

impl ActorHandle {
    /// Wrap `actor` with an inbox and a (not yet started) worker.
    pub fn new<A: Actor>(actor: A, bus: BusSender, settings: ActorSettings) -> Arc<Self> {
        let name = actor.name().to_string();
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();

        let mut table = HandlerTable::new();
        A::register_handlers(&mut table);
        let ctx = ActorContext::with_stop_token(name.clone(), bus, cancel.clone());
        let worker = Box::pin(run_worker(actor, ctx, table, rx, cancel.clone()));

        Arc::new(Self {
            name,
            inbox: tx,
            cancel,
            stop_timeout: settings.stop_timeout,
            lifecycle: Mutex::new(Lifecycle::Idle(worker)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Non-blocking push into the inbox. Fails only once the worker is gone.
    pub fn receive(&self, message: Message) -> Result<(), DeliveryError> {
        self.inbox
            .send(message)
            .map_err(|_| DeliveryError::InboxClosed(self.name.clone()))
    }

    /// Spawn the worker. Returns `false` if it was already running or has
    /// been stopped; a stopped actor is never restarted.
    pub async fn start(&self) -> bool {
        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Idle(worker) => {
                *lifecycle = Lifecycle::Running(tokio::spawn(worker));
                info!(actor = %self.name, "actor started");
                true
            }
            running @ Lifecycle::Running(_) => {
                *lifecycle = running;
                debug!(actor = %self.name, "actor already running");
                false
            }
            Lifecycle::Stopped => {
                warn!(actor = %self.name, "actor was stopped and cannot be restarted");
                false
            }
        }
    }

    /// Signal the worker to exit and wait for it, bounded by the configured
    /// stop timeout. A worker stuck in a slow handler is left detached.
    pub async fn stop(&self) -> StopOutcome {
        self.cancel.cancel();
        let mut lifecycle = self.lifecycle.lock().await;
        match std::mem::replace(&mut *lifecycle, Lifecycle::Stopped) {
            Lifecycle::Running(handle) => match tokio::time::timeout(self.stop_timeout, handle).await {
                Ok(Ok(())) => {
                    debug!(actor = %self.name, "actor stopped");
                    StopOutcome::Stopped
                }
                Ok(Err(err)) => {
                    error!(actor = %self.name, error = %err, "actor worker task failed");
                    StopOutcome::Stopped
                }
                Err(_) => {
                    warn!(
                        actor = %self.name,
                        timeout_ms = self.stop_timeout.as_millis() as u64,
                        "actor did not stop in time"
                    );
                    StopOutcome::TimedOut
                }
            },
            Lifecycle::Idle(_) | Lifecycle::Stopped => StopOutcome::NotRunning,
        }
    }

    pub async fn is_running(&self) -> bool {
        matches!(&*self.lifecycle.lock().await, Lifecycle::Running(h) if !h.is_finished())
    }
}

impl std::fmt::Debug for ActorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActorHandle")
            .field("name", &self.name)
            .field("inbox_closed", &self.inbox.is_closed())
            .field("stopping", &self.cancel.is_cancelled())
            .finish()
    }
}

async fn run_worker<A: Actor>(
    mut actor: A,
    mut ctx: ActorContext,
    table: HandlerTable<A>,
    mut inbox: mpsc::UnboundedReceiver<Message>,
    cancel: CancellationToken,
) {
    loop {
        let message = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            next = inbox.recv() => match next {
                Some(message) => message,
                None => break,
            },
        };
        table.dispatch(&mut actor, &mut ctx, message).await;
    }
    debug!(actor = ctx.name(), "worker loop exited");
}
