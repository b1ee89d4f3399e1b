//! Actor message envelope and typed payloads.
//!
//! Every interaction between actors is a [`Message`]: an immutable envelope
//! carrying a [`MessageKind`] tag used for handler dispatch and a [`Payload`]
//! whose variant describes the actual content. The kind never constrains the
//! payload shape; handlers match on the payload variant they expect.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::conversation::{EndReason, HistoryEntry};
use crate::experience::ExperienceRecord;
use crate::knowledge::KnowledgeState;

/// A message routed by the event bus from one actor to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// UUIDv7 message ID, assigned at construction and never reused.
    pub id: Uuid,
    /// Name of the sending actor.
    pub sender: String,
    /// Name of the receiving actor.
    pub recipient: String,
    /// Dispatch tag.
    pub kind: MessageKind,
    /// Typed content.
    pub payload: Payload,
    /// When the message was created.
    pub timestamp: DateTime<Utc>,
    /// Links a request to its eventual response. Propagated unchanged.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlation_id: Option<String>,
}

impl Message {
    /// Build a new message with a fresh ID and the current timestamp.
    pub fn new(
        sender: impl Into<String>,
        recipient: impl Into<String>,
        kind: MessageKind,
        payload: Payload,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: sender.into(),
            recipient: recipient.into(),
            kind,
            payload,
            timestamp: Utc::now(),
            correlation_id: None,
        }
    }

    /// Attach a correlation ID.
    pub fn with_correlation(mut self, correlation_id: Option<String>) -> Self {
        self.correlation_id = correlation_id;
        self
    }

    /// Build a reply addressed to this message's sender.
    ///
    /// The reply's sender is this message's recipient and the correlation ID
    /// is carried over unchanged.
    pub fn reply(&self, kind: MessageKind, payload: Payload) -> Self {
        Message::new(self.recipient.clone(), self.sender.clone(), kind, payload)
            .with_correlation(self.correlation_id.clone())
    }
}

/// Closed set of message intents used for handler dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    ReviewRequest,
    ReviewResponse,
    AnalysisRequest,
    AnalysisResponse,
    ReflectionRequest,
    ReflectionResponse,
    SystemControl,
    Error,
    Termination,
    Heartbeat,
}

impl MessageKind {
    /// Every kind, in declaration order.
    pub const ALL: [MessageKind; 12] = [
        MessageKind::Request,
        MessageKind::Response,
        MessageKind::ReviewRequest,
        MessageKind::ReviewResponse,
        MessageKind::AnalysisRequest,
        MessageKind::AnalysisResponse,
        MessageKind::ReflectionRequest,
        MessageKind::ReflectionResponse,
        MessageKind::SystemControl,
        MessageKind::Error,
        MessageKind::Termination,
        MessageKind::Heartbeat,
    ];
}

impl fmt::Display for MessageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::ReviewRequest => "review_request",
            MessageKind::ReviewResponse => "review_response",
            MessageKind::AnalysisRequest => "analysis_request",
            MessageKind::AnalysisResponse => "analysis_response",
            MessageKind::ReflectionRequest => "reflection_request",
            MessageKind::ReflectionResponse => "reflection_response",
            MessageKind::SystemControl => "system_control",
            MessageKind::Error => "error",
            MessageKind::Termination => "termination",
            MessageKind::Heartbeat => "heartbeat",
        };
        write!(f, "{s}")
    }
}

/// Typed message content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Payload {
    StartConversation(StartConversation),
    Turn(Turn),
    ReviewRequest(ReviewRequest),
    ReviewVerdict(ReviewVerdict),
    AnalysisRequest(AnalysisRequest),
    KnowledgeSummary(KnowledgeSummary),
    ReflectionRequest(ReflectionRequest),
    ReflectionReport(ReflectionReport),
    Control(ControlCommand),
    ConversationEnded(ConversationEnded),
    Error(ErrorNotice),
    Empty,
}

impl Payload {
    /// Short variant name for logging.
    pub fn variant(&self) -> &'static str {
        match self {
            Payload::StartConversation(_) => "start_conversation",
            Payload::Turn(_) => "turn",
            Payload::ReviewRequest(_) => "review_request",
            Payload::ReviewVerdict(_) => "review_verdict",
            Payload::AnalysisRequest(_) => "analysis_request",
            Payload::KnowledgeSummary(_) => "knowledge_summary",
            Payload::ReflectionRequest(_) => "reflection_request",
            Payload::ReflectionReport(_) => "reflection_report",
            Payload::Control(_) => "control",
            Payload::ConversationEnded(_) => "conversation_ended",
            Payload::Error(_) => "error",
            Payload::Empty => "empty",
        }
    }
}

/// Asks the first participant to open a conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartConversation {
    pub conversation_id: String,
    pub problem: String,
}

/// One utterance in the dialogue, from either side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub conversation_id: String,
    pub speaker: String,
    pub content: String,
    pub round: u32,
    /// Learner's self-reported emotion, when the speaker is the learner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emotion: Option<String>,
}

/// A tutor draft submitted for quality review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewRequest {
    pub conversation_id: String,
    pub round: u32,
    /// 1-based attempt counter for this round.
    pub attempt: u32,
    pub learner_message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub learner_emotion: Option<String>,
    pub draft: String,
}

/// The monitor's judgement on a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub conversation_id: String,
    pub round: u32,
    pub attempt: u32,
    pub approved: bool,
    pub overall_score: f32,
    pub emotional_score: f32,
    pub professional_score: f32,
    pub reason: String,
    /// Revision guidance, only present when the draft was rejected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
}

/// Asks the knowledge tracker for a summary of the learner's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
}

/// The knowledge tracker's answer to an [`AnalysisRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeSummary {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub state: KnowledgeState,
}

/// Asks the reflection actor to distill a completed conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionRequest {
    pub conversation_id: String,
    pub problem: String,
    pub history: Vec<HistoryEntry>,
    /// Persona tags of the learner at the start of the conversation.
    #[serde(default)]
    pub learner_emotions: Vec<String>,
}

/// Outcome of a reflection pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReflectionReport {
    pub conversation_id: String,
    /// Whether the experience was written to the bank.
    pub stored: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub experience: Option<ExperienceRecord>,
}

/// Lifecycle commands addressed to the orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlCommand {
    pub conversation_id: String,
    pub action: ControlAction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ControlAction {
    /// Start a new conversation about `problem`.
    Begin { problem: String },
    /// End the conversation immediately.
    End { reason: EndReason },
}

/// Termination notice sent to every participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationEnded {
    pub conversation_id: String,
    pub reason: EndReason,
}

/// Delivery failure reported back to the original sender.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    pub reason: String,
    pub original_message_id: Uuid,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
