//! Shared fixtures for unit tests: recording actors, scripted providers, and
//! an in-memory experience store.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::{Mutex, mpsc};

use tutorsim_types::error::StoreError;
use tutorsim_types::experience::ExperienceRecord;
use tutorsim_types::llm::{CompletionRequest, CompletionResponse, LlmError, Usage};
use tutorsim_types::message::{Message, MessageKind, Payload, Turn};

use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::llm::{BoxLlmProvider, Collaborator, GenerationDefaults, LlmProvider};
use crate::message::BusSender;
use crate::repository::ExperienceStore;

/// A bus sender whose queue the test reads directly.
pub fn bus_pair() -> (BusSender, mpsc::UnboundedReceiver<Message>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BusSender::new(tx), rx)
}

pub async fn recv_within(rx: &mut mpsc::UnboundedReceiver<Message>, ms: u64) -> Option<Message> {
    tokio::time::timeout(Duration::from_millis(ms), rx.recv())
        .await
        .ok()
        .flatten()
}

/// Drain everything currently queued.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<Message> {
    let mut out = Vec::new();
    while let Ok(msg) = rx.try_recv() {
        out.push(msg);
    }
    out
}

/// Payload tagged with a sequence number.
pub fn seq_payload(seq: u32) -> Payload {
    Payload::Turn(Turn {
        conversation_id: "seq".to_string(),
        speaker: "test".to_string(),
        content: String::new(),
        round: seq,
        emotion: None,
    })
}

pub fn seq_of(message: &Message) -> u32 {
    match &message.payload {
        Payload::Turn(turn) => turn.round,
        other => panic!("expected sequence payload, got {}", other.variant()),
    }
}

/// Forwards every message it receives, of any kind, to a test channel.
pub struct Recorder {
    name: String,
    seen: mpsc::UnboundedSender<Message>,
}

impl Recorder {
    pub fn new(name: &str) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.to_string(),
                seen: tx,
            },
            rx,
        )
    }

    async fn record(&mut self, _ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let _ = self.seen.send(message);
        Ok(())
    }
}

impl Actor for Recorder {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        for kind in MessageKind::ALL {
            table.on(kind, |a, c, m| Box::pin(a.record(c, m)));
        }
    }
}

/// Sleeps in its request handler.
pub struct SlowActor {
    name: String,
    delay: Duration,
}

impl SlowActor {
    pub fn new(name: &str, delay: Duration) -> Self {
        Self {
            name: name.to_string(),
            delay,
        }
    }

    async fn on_request(&mut self, _ctx: &mut ActorContext, _msg: Message) -> Result<(), ActorError> {
        tokio::time::sleep(self.delay).await;
        Ok(())
    }
}

impl Actor for SlowActor {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on(MessageKind::Request, |a, c, m| Box::pin(a.on_request(c, m)));
    }
}

#[derive(Default)]
pub struct ProbeStats {
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub handled: AtomicUsize,
}

/// Records how many of its handlers run at once.
pub struct ConcurrencyProbe {
    name: String,
    delay: Duration,
    stats: Arc<ProbeStats>,
}

impl ConcurrencyProbe {
    pub fn new(name: &str, delay: Duration) -> (Self, Arc<ProbeStats>) {
        let stats = Arc::new(ProbeStats::default());
        (
            Self {
                name: name.to_string(),
                delay,
                stats: Arc::clone(&stats),
            },
            stats,
        )
    }

    async fn on_request(&mut self, _ctx: &mut ActorContext, _msg: Message) -> Result<(), ActorError> {
        let now = self.stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        self.stats.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.stats.handled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Actor for ConcurrencyProbe {
    fn name(&self) -> &str {
        &self.name
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on(MessageKind::Request, |a, c, m| Box::pin(a.on_request(c, m)));
    }
}

type Script = Box<dyn Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync>;

/// Provider that answers from a closure instead of the network.
pub struct ScriptedProvider {
    script: Script,
    calls: Arc<AtomicUsize>,
    /// Never answer; every call stays pending.
    stalled: bool,
}

impl ScriptedProvider {
    pub fn new<F>(script: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            script: Box::new(script),
            calls: Arc::new(AtomicUsize::new(0)),
            stalled: false,
        }
    }

    pub fn replying(text: &str) -> Self {
        let text = text.to_string();
        Self::new(move |_| Ok(text.clone()))
    }

    pub fn failing() -> Self {
        Self::new(|_| {
            Err(LlmError::Provider {
                message: "service unavailable".to_string(),
            })
        })
    }

    /// A service that accepts requests and never replies.
    pub fn stalled() -> Self {
        Self {
            stalled: true,
            ..Self::replying("")
        }
    }

    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled {
            return std::future::pending().await;
        }
        let content = (self.script)(request)?;
        Ok(CompletionResponse {
            content,
            model: "scripted-model".to_string(),
            usage: Usage::default(),
        })
    }
}

pub fn collaborator(provider: ScriptedProvider) -> Collaborator {
    Collaborator::new(
        Arc::new(BoxLlmProvider::new(provider)),
        GenerationDefaults {
            temperature: 0.7,
            max_tokens: 1000,
        },
    )
}

/// System prompt of a request, or "".
pub fn system_of(request: &CompletionRequest) -> &str {
    request.system.as_deref().unwrap_or("")
}

/// Content of the last message of a request, or "".
pub fn last_user(request: &CompletionRequest) -> &str {
    request.messages.last().map(|m| m.content.as_str()).unwrap_or("")
}

/// Experience store backed by a shared map.
#[derive(Clone, Default)]
pub struct MemoryExperienceStore {
    pub records: Arc<Mutex<BTreeMap<String, ExperienceRecord>>>,
    pub fail: bool,
}

impl ExperienceStore for MemoryExperienceStore {
    async fn save(&self, key: &str, record: &ExperienceRecord) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Serialization("disk on fire".to_string()));
        }
        self.records
            .lock()
            .await
            .insert(key.to_string(), record.clone());
        Ok(())
    }

    async fn load_all(&self) -> Result<BTreeMap<String, ExperienceRecord>, StoreError> {
        Ok(self.records.lock().await.clone())
    }
}
