//! Conversation bookkeeping and termination rules.

pub mod policy;
pub mod tracker;

pub use policy::{TerminationDecision, TerminationPolicy, UnderstandingJudge};
pub use tracker::{ConversationTracker, TrackerError};
