//! Conversation records, history entries, and the persisted transcript format.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::MessageKind;

/// Lifecycle of a conversation. Transitions only move forward:
/// `Active -> Ending -> Completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStatus {
    Active,
    Ending,
    Completed,
}

impl fmt::Display for ConversationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConversationStatus::Active => write!(f, "active"),
            ConversationStatus::Ending => write!(f, "ending"),
            ConversationStatus::Completed => write!(f, "completed"),
        }
    }
}

/// Why a conversation ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EndReason {
    /// The round cap was reached.
    MaxRounds { rounds: u32 },
    /// The latest utterance contained a closing keyword.
    ClosingKeyword { keyword: String },
    /// The semantic judge decided the learner has understood.
    Understood,
    /// The harness deadline elapsed.
    Timeout,
    /// Ended for any other reason.
    Aborted { detail: String },
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndReason::MaxRounds { rounds } => write!(f, "reached max rounds ({rounds})"),
            EndReason::ClosingKeyword { keyword } => write!(f, "closing keyword '{keyword}'"),
            EndReason::Understood => write!(f, "learner understood the problem"),
            EndReason::Timeout => write!(f, "conversation timed out"),
            EndReason::Aborted { detail } => write!(f, "aborted: {detail}"),
        }
    }
}

/// One entry in a conversation's append-only history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub sender: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    pub round: u32,
    pub timestamp: DateTime<Utc>,
}

/// In-memory state of one conversation, owned by the conversation tracker.
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: String,
    /// Ordered participants; the first one opens the conversation.
    pub participants: Vec<String>,
    pub problem: String,
    pub history: Vec<HistoryEntry>,
    pub round: u32,
    pub status: ConversationStatus,
    pub end_reason: Option<EndReason>,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl ConversationRecord {
    pub fn new(id: impl Into<String>, participants: Vec<String>, problem: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            participants,
            problem: problem.into(),
            history: Vec::new(),
            round: 0,
            status: ConversationStatus::Active,
            end_reason: None,
            started_at: Utc::now(),
            ended_at: None,
        }
    }

    /// Snapshot this record in its persisted form.
    pub fn to_transcript(&self) -> TranscriptRecord {
        TranscriptRecord {
            conversation_id: self.id.clone(),
            problem_content: self.problem.clone(),
            total_rounds: self.round,
            conversation_history: self.history.clone(),
            end_reason: self.end_reason.clone(),
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }
}

/// Persisted transcript of a completed conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptRecord {
    pub conversation_id: String,
    pub problem_content: String,
    pub total_rounds: u32,
    pub conversation_history: Vec<HistoryEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_reason: Option<EndReason>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}
