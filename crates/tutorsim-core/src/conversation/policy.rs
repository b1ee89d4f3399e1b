//! Termination rules for a conversation.
//!
//! Checked in order: the hard round cap, then closing keywords in the latest
//! utterance, then (optionally) a semantic judgement from the generation
//! service. A failed or unparseable judgement means "keep going".

use serde::Deserialize;
use tracing::debug;

use tutorsim_types::config::ConversationConfig;
use tutorsim_types::conversation::{EndReason, HistoryEntry};

use crate::llm::{Collaborator, Prompt};

/// Outcome of a termination check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationDecision {
    Continue,
    End(EndReason),
}

/// Round cap, closing keywords, and an optional semantic judge.
#[derive(Debug, Clone)]
pub struct TerminationPolicy {
    max_rounds: u32,
    closing_keywords: Vec<String>,
    judge: Option<UnderstandingJudge>,
}

impl TerminationPolicy {
    pub fn new(max_rounds: u32, closing_keywords: Vec<String>) -> Self {
        Self {
            max_rounds,
            closing_keywords,
            judge: None,
        }
    }

    pub fn from_config(config: &ConversationConfig) -> Self {
        Self::new(config.max_rounds, config.closing_keywords.clone())
    }

    pub fn with_judge(mut self, judge: UnderstandingJudge) -> Self {
        self.judge = Some(judge);
        self
    }

    pub fn max_rounds(&self) -> u32 {
        self.max_rounds
    }

    /// The synchronous rules: round cap, then keywords.
    pub fn check_rules(&self, round: u32, latest: &str) -> Option<EndReason> {
        if round >= self.max_rounds {
            return Some(EndReason::MaxRounds { rounds: round });
        }
        let lowered = latest.to_lowercase();
        self.closing_keywords
            .iter()
            .find(|keyword| !keyword.is_empty() && lowered.contains(&keyword.to_lowercase()))
            .map(|keyword| EndReason::ClosingKeyword {
                keyword: keyword.clone(),
            })
    }

    /// All rules, including the semantic judge when configured.
    pub async fn evaluate(
        &self,
        round: u32,
        latest: &str,
        problem: &str,
        history: &[HistoryEntry],
    ) -> TerminationDecision {
        if let Some(reason) = self.check_rules(round, latest) {
            return TerminationDecision::End(reason);
        }
        if let Some(judge) = &self.judge {
            if judge.has_understood(problem, history).await {
                return TerminationDecision::End(EndReason::Understood);
            }
        }
        TerminationDecision::Continue
    }
}

pub(crate) const JUDGE_SYSTEM_PROMPT: &str = "You evaluate tutoring dialogues. Decide whether \
the student now genuinely understands how to solve the problem. Reply with JSON only: \
{\"understood\": true or false, \"reason\": \"one sentence\"}";

#[derive(Debug, Deserialize)]
struct Judgement {
    #[serde(default)]
    understood: bool,
    #[serde(default)]
    reason: String,
}

/// Asks the generation service whether the learner has understood.
#[derive(Debug, Clone)]
pub struct UnderstandingJudge {
    llm: Collaborator,
}

impl UnderstandingJudge {
    pub fn new(llm: Collaborator) -> Self {
        Self { llm }
    }

    pub async fn has_understood(&self, problem: &str, history: &[HistoryEntry]) -> bool {
        let dialogue = history
            .iter()
            .map(|entry| format!("{}: {}", entry.sender, entry.content))
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = Prompt::new("judge_understanding")
            .system(JUDGE_SYSTEM_PROMPT)
            .user(format!("Problem: {problem}\n\nDialogue:\n{dialogue}"))
            .temperature(0.2)
            .max_tokens(150);

        match self.llm.generate_json::<Judgement>(prompt).await {
            Some(judgement) => {
                debug!(understood = judgement.understood, reason = %judgement.reason, "understanding judged");
                judgement.understood
            }
            None => false,
        }
    }
}
