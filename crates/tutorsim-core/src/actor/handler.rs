//! Handler tables: message kind to async handler, plus the built-in defaults.

use std::any::Any;
use std::collections::HashMap;
use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use futures_util::future::BoxFuture;
use tracing::{debug, error, info, trace, warn};

use tutorsim_types::message::{Message, MessageKind, Payload};

use super::{ActorContext, ActorError};

/// Future returned by a handler; borrows the actor and its context.
pub type HandlerFuture<'a> = BoxFuture<'a, Result<(), ActorError>>;

type Handler<A> = Box<
    dyn for<'a> Fn(&'a mut A, &'a mut ActorContext, Message) -> HandlerFuture<'a> + Send + Sync,
>;

/// Per-actor mapping from [`MessageKind`] to handler.
///
/// Handlers are registered as closures that box an actor method:
///
/// ```ignore
/// table.on(MessageKind::Request, |actor, ctx, msg| Box::pin(actor.on_request(ctx, msg)));
/// ```
///
/// Kinds without a registered handler fall back to the defaults: `error` is
/// logged, `termination` stops the worker, `heartbeat` is traced, anything
/// else is logged and dropped.
pub struct HandlerTable<A> {
    handlers: HashMap<MessageKind, Handler<A>>,
}

impl<A: Send + 'static> HandlerTable<A> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register `handler` for `kind`, replacing any previous one.
    pub fn on<F>(&mut self, kind: MessageKind, handler: F) -> &mut Self
    where
        F: for<'a> Fn(&'a mut A, &'a mut ActorContext, Message) -> HandlerFuture<'a>
            + Send
            + Sync
            + 'static,
    {
        self.handlers.insert(kind, Box::new(handler));
        self
    }

    pub fn handles(&self, kind: MessageKind) -> bool {
        self.handlers.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler for `message`, absorbing errors and panics.
    pub(crate) async fn dispatch(&self, actor: &mut A, ctx: &mut ActorContext, message: Message) {
        let Some(handler) = self.handlers.get(&message.kind) else {
            handle_default(ctx, message);
            return;
        };

        let message_id = message.id;
        let kind = message.kind;
        let outcome = AssertUnwindSafe(handler(actor, ctx, message))
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!(actor = ctx.name(), %message_id, %kind, error = %err, "handler failed");
            }
            Err(panic) => {
                error!(
                    actor = ctx.name(),
                    %message_id,
                    %kind,
                    panic = %panic_message(panic.as_ref()),
                    "handler panicked"
                );
            }
        }
    }
}

impl<A: Send + 'static> Default for HandlerTable<A> {
    fn default() -> Self {
        Self::new()
    }
}

fn handle_default(ctx: &mut ActorContext, message: Message) {
    match message.kind {
        MessageKind::Error => match &message.payload {
            Payload::Error(notice) => warn!(
                actor = ctx.name(),
                original_message_id = %notice.original_message_id,
                reason = %notice.reason,
                "received error notice"
            ),
            other => warn!(actor = ctx.name(), payload = other.variant(), "received error message"),
        },
        MessageKind::Termination => {
            info!(actor = ctx.name(), sender = %message.sender, "termination received, stopping");
            ctx.request_stop();
        }
        MessageKind::Heartbeat => {
            trace!(actor = ctx.name(), sender = %message.sender, "heartbeat");
        }
        kind => {
            debug!(
                actor = ctx.name(),
                message_id = %message.id,
                %kind,
                "no handler registered, dropping message"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
