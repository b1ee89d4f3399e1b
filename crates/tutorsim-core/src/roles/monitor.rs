//! Quality reviewer for tutor drafts.
//!
//! Scores each draft on emotional support and teaching quality. A draft is
//! approved when the overall score reaches `pass_score` and neither aspect
//! falls below `min_aspect_score`. When no usable judgement comes back the
//! draft is approved by default so the dialogue keeps moving.

use serde::Deserialize;
use tracing::{debug, info};

use tutorsim_types::config::ReviewConfig;
use tutorsim_types::message::{Message, MessageKind, Payload, ReviewRequest, ReviewVerdict};

use super::MONITOR;
use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::llm::json::lenient_number;
use crate::llm::{Collaborator, Prompt};

pub(crate) const REVIEW_PROMPT: &str = "You review a math tutor's draft reply before the \
student sees it. Score it from 0 to 10 on emotional support (empathy, encouragement, tone for \
the student's emotion) and professional quality (correctness, Socratic guidance, not giving \
away the answer), plus an overall score. Respond with JSON only: {\"emotional_score\": n, \
\"professional_score\": n, \"overall_score\": n, \"reason\": \"...\", \"feedback\": \"how to \
improve the draft\"}";

pub(crate) const DEFAULT_SCORE: f32 = 8.0;
pub(crate) const DEFAULT_REASON: &str = "review unavailable, approved by default";

#[derive(Debug, Deserialize)]
struct Judgement {
    #[serde(default, deserialize_with = "lenient_number")]
    emotional_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    professional_score: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    overall_score: Option<f64>,
    #[serde(default)]
    reason: String,
    #[serde(default)]
    feedback: Option<String>,
}

/// Scores filled in from whichever fields the judgement carried.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scores {
    emotional: f32,
    professional: f32,
    overall: f32,
}

impl Judgement {
    fn scores(&self) -> Option<Scores> {
        let overall = match (self.overall_score, self.emotional_score, self.professional_score) {
            (Some(overall), _, _) => overall,
            (None, Some(e), Some(p)) => (e + p) / 2.0,
            (None, Some(one), None) | (None, None, Some(one)) => one,
            (None, None, None) => return None,
        };
        let clamp = |v: f64| v.clamp(0.0, 10.0) as f32;
        Some(Scores {
            emotional: clamp(self.emotional_score.unwrap_or(overall)),
            professional: clamp(self.professional_score.unwrap_or(overall)),
            overall: clamp(overall),
        })
    }
}

pub struct MonitorActor {
    llm: Collaborator,
    config: ReviewConfig,
    reviews: u32,
    approvals: u32,
}

impl MonitorActor {
    pub fn new(llm: Collaborator, config: &ReviewConfig) -> Self {
        Self {
            llm,
            config: config.clone(),
            reviews: 0,
            approvals: 0,
        }
    }

    pub fn reviews_completed(&self) -> u32 {
        self.reviews
    }

    async fn on_review(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::ReviewRequest(request) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };

        let verdict = self.review(request).await;
        self.reviews += 1;
        if verdict.approved {
            self.approvals += 1;
        }
        ctx.set("reviews_completed", self.reviews);
        ctx.set("approvals", self.approvals);
        info!(
            round = verdict.round,
            attempt = verdict.attempt,
            approved = verdict.approved,
            overall = verdict.overall_score,
            "draft reviewed"
        );

        ctx.reply(&message, MessageKind::ReviewResponse, Payload::ReviewVerdict(verdict))?;
        Ok(())
    }

    async fn review(&self, request: &ReviewRequest) -> ReviewVerdict {
        let prompt = Prompt::new("monitor_review")
            .system(REVIEW_PROMPT)
            .user(format!(
                "Student message: {}\nStudent emotion: {}\n\nTutor draft:\n{}",
                request.learner_message,
                request.learner_emotion.as_deref().unwrap_or("unknown"),
                request.draft
            ))
            .temperature(0.2)
            .max_tokens(400);

        let judgement: Option<Judgement> = self.llm.generate_json(prompt).await;
        let Some((judgement, scores)) = judgement.and_then(|j| j.scores().map(|s| (j, s))) else {
            debug!(round = request.round, "no usable judgement, approving by default");
            return ReviewVerdict {
                conversation_id: request.conversation_id.clone(),
                round: request.round,
                attempt: request.attempt,
                approved: true,
                overall_score: DEFAULT_SCORE,
                emotional_score: DEFAULT_SCORE,
                professional_score: DEFAULT_SCORE,
                reason: DEFAULT_REASON.to_string(),
                feedback: None,
            };
        };

        let approved = scores.overall >= self.config.pass_score
            && scores.emotional >= self.config.min_aspect_score
            && scores.professional >= self.config.min_aspect_score;
        let feedback = if approved {
            None
        } else {
            judgement
                .feedback
                .filter(|f| !f.trim().is_empty())
                .or_else(|| Some(judgement.reason.clone()))
        };

        ReviewVerdict {
            conversation_id: request.conversation_id.clone(),
            round: request.round,
            attempt: request.attempt,
            approved,
            overall_score: scores.overall,
            emotional_score: scores.emotional,
            professional_score: scores.professional,
            reason: judgement.reason,
            feedback,
        }
    }
}

impl Actor for MonitorActor {
    fn name(&self) -> &str {
        MONITOR
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on(MessageKind::ReviewRequest, |a, c, m| Box::pin(a.on_review(c, m)));
    }
}
