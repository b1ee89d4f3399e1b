//! Constructors for messages the runtime itself originates.

use uuid::Uuid;

use tutorsim_types::conversation::EndReason;
use tutorsim_types::message::{ConversationEnded, ErrorNotice, Message, MessageKind, Payload};

/// Sender name used for messages synthesized by the event bus.
pub const BUS_SENDER: &str = "event_bus";

/// Error notice returned to `original_sender` when delivery of
/// `original_message_id` failed.
pub fn delivery_failure(original_sender: &str, original_message_id: Uuid, reason: &str) -> Message {
    Message::new(
        BUS_SENDER,
        original_sender,
        MessageKind::Error,
        Payload::Error(ErrorNotice {
            reason: reason.to_string(),
            original_message_id,
        }),
    )
}

/// Termination notice for one participant of an ended conversation.
pub fn termination_notice(
    sender: &str,
    participant: &str,
    conversation_id: &str,
    reason: &EndReason,
) -> Message {
    Message::new(
        sender,
        participant,
        MessageKind::Termination,
        Payload::ConversationEnded(ConversationEnded {
            conversation_id: conversation_id.to_string(),
            reason: reason.clone(),
        }),
    )
    .with_correlation(Some(conversation_id.to_string()))
}
