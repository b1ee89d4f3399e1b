//! Conversation tracker: per-conversation records, round counting, and the
//! termination handshake.
//!
//! The tracker is a plain struct owned by the orchestrator actor, so every
//! mutation happens on that actor's worker. Other actors change conversation
//! state only by messaging the orchestrator.

use std::collections::HashMap;

use chrono::Utc;
use thiserror::Error;
use tracing::{debug, info};

use tutorsim_types::conversation::{
    ConversationRecord, ConversationStatus, EndReason, HistoryEntry, TranscriptRecord,
};
use tutorsim_types::message::{Message, MessageKind, Payload, StartConversation};

use super::policy::{TerminationDecision, TerminationPolicy};
use crate::message::envelope::termination_notice;
use crate::message::{BusError, BusSender};

/// Errors from conversation bookkeeping.
#[derive(Debug, Error)]
pub enum TrackerError {
    #[error("conversation {0} not found")]
    NotFound(String),

    #[error("conversation {0} already exists")]
    AlreadyExists(String),

    #[error("conversation {0} has no participants")]
    NoParticipants(String),

    #[error("conversation {0} is completed")]
    Completed(String),

    #[error("conversation {id} is {status}, not completed")]
    NotCompleted { id: String, status: ConversationStatus },

    #[error(transparent)]
    Bus(#[from] BusError),
}

pub struct ConversationTracker {
    /// Name used as the sender of tracker-originated messages.
    owner: String,
    bus: BusSender,
    policy: TerminationPolicy,
    /// Only turns from this participant advance the round counter.
    round_initiator: String,
    conversations: HashMap<String, ConversationRecord>,
}

impl ConversationTracker {
    pub fn new(
        owner: impl Into<String>,
        bus: BusSender,
        policy: TerminationPolicy,
        round_initiator: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            bus,
            policy,
            round_initiator: round_initiator.into(),
            conversations: HashMap::new(),
        }
    }

    /// Create an active conversation and ask the first participant to open it.
    pub fn start_conversation(
        &mut self,
        id: &str,
        participants: Vec<String>,
        problem: &str,
    ) -> Result<(), TrackerError> {
        if self.conversations.contains_key(id) {
            return Err(TrackerError::AlreadyExists(id.to_string()));
        }
        let Some(first) = participants.first().cloned() else {
            return Err(TrackerError::NoParticipants(id.to_string()));
        };

        self.conversations
            .insert(id.to_string(), ConversationRecord::new(id, participants, problem));

        let start = Message::new(
            self.owner.as_str(),
            first.as_str(),
            MessageKind::Request,
            Payload::StartConversation(StartConversation {
                conversation_id: id.to_string(),
                problem: problem.to_string(),
            }),
        )
        .with_correlation(Some(id.to_string()));
        self.bus.send(start)?;

        info!(conversation_id = %id, first_speaker = %first, "conversation started");
        Ok(())
    }

    /// Append an utterance to the history. Returns the current round.
    ///
    /// The round advances before the entry is recorded when `sender` is the
    /// round initiator, so the initiator's first turn belongs to round 1.
    pub fn append_message(
        &mut self,
        id: &str,
        sender: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<u32, TrackerError> {
        let record = self
            .conversations
            .get_mut(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        if record.status == ConversationStatus::Completed {
            return Err(TrackerError::Completed(id.to_string()));
        }

        if sender == self.round_initiator {
            record.round += 1;
        }
        record.history.push(HistoryEntry {
            sender: sender.to_string(),
            content: content.to_string(),
            kind,
            round: record.round,
            timestamp: Utc::now(),
        });
        debug!(conversation_id = %id, %sender, round = record.round, "message appended");
        Ok(record.round)
    }

    /// Decide whether the conversation should end after `latest`.
    ///
    /// Unknown or already completed conversations always terminate.
    pub async fn should_terminate(&self, id: &str, latest: &str) -> TerminationDecision {
        let Some(record) = self.conversations.get(id) else {
            return TerminationDecision::End(EndReason::Aborted {
                detail: format!("unknown conversation {id}"),
            });
        };
        if record.status != ConversationStatus::Active {
            return TerminationDecision::End(
                record
                    .end_reason
                    .clone()
                    .unwrap_or(EndReason::Aborted {
                        detail: format!("conversation is {}", record.status),
                    }),
            );
        }
        self.policy
            .evaluate(record.round, latest, &record.problem, &record.history)
            .await
    }

    /// Move an active conversation to `Ending`. The first reason sticks.
    pub fn begin_ending(&mut self, id: &str, reason: EndReason) -> Result<(), TrackerError> {
        let record = self.record_mut(id)?;
        match record.status {
            ConversationStatus::Active => {
                debug!(conversation_id = %id, %reason, "conversation ending");
                record.status = ConversationStatus::Ending;
                record.end_reason = Some(reason);
                Ok(())
            }
            ConversationStatus::Ending => Ok(()),
            ConversationStatus::Completed => Err(TrackerError::Completed(id.to_string())),
        }
    }

    /// Complete the conversation and notify every participant.
    ///
    /// Returns `false` without side effects when it was already completed.
    pub fn end_conversation(&mut self, id: &str) -> Result<bool, TrackerError> {
        let owner = self.owner.clone();
        let record = self.record_mut(id)?;
        if record.status == ConversationStatus::Completed {
            return Ok(false);
        }

        record.status = ConversationStatus::Completed;
        record.ended_at = Some(Utc::now());
        let reason = record
            .end_reason
            .get_or_insert_with(|| EndReason::Aborted {
                detail: "ended without a reason".to_string(),
            })
            .clone();
        let participants = record.participants.clone();
        let rounds = record.round;

        for participant in &participants {
            self.bus
                .send(termination_notice(&owner, participant, id, &reason))?;
        }
        info!(conversation_id = %id, %reason, rounds, "conversation completed");
        Ok(true)
    }

    pub fn record(&self, id: &str) -> Option<&ConversationRecord> {
        self.conversations.get(id)
    }

    pub fn history(&self, id: &str) -> Option<&[HistoryEntry]> {
        self.conversations.get(id).map(|r| r.history.as_slice())
    }

    pub fn status(&self, id: &str) -> Option<ConversationStatus> {
        self.conversations.get(id).map(|r| r.status)
    }

    /// Persistable transcript. Only available once completed.
    pub fn transcript(&self, id: &str) -> Result<TranscriptRecord, TrackerError> {
        let record = self
            .conversations
            .get(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))?;
        if record.status != ConversationStatus::Completed {
            return Err(TrackerError::NotCompleted {
                id: id.to_string(),
                status: record.status,
            });
        }
        Ok(record.to_transcript())
    }

    fn record_mut(&mut self, id: &str) -> Result<&mut ConversationRecord, TrackerError> {
        self.conversations
            .get_mut(id)
            .ok_or_else(|| TrackerError::NotFound(id.to_string()))
    }
}

impl std::fmt::Debug for ConversationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationTracker")
            .field("owner", &self.owner)
            .field("conversations", &self.conversations.len())
            .field("max_rounds", &self.policy.max_rounds())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
