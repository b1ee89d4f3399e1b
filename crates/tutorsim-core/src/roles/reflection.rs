//! Reflection: distills a completed conversation into one teaching
//! experience and writes it to the experience bank.
//!
//! This actor is the only writer of the bank during a simulation.

use chrono::Utc;
use serde::Deserialize;
use tracing::{info, warn};

use tutorsim_types::conversation::HistoryEntry;
use tutorsim_types::experience::{ExperienceRecord, clamp_score};
use tutorsim_types::message::{
    Message, MessageKind, Payload, ReflectionReport, ReflectionRequest,
};

use super::REFLECTION;
use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::llm::json::lenient_number;
use crate::llm::{Collaborator, Prompt};
use crate::repository::ExperienceStore;

pub(crate) const REFLECTION_PROMPT: &str = "You review a finished tutoring conversation and \
extract one reusable teaching experience. Respond with JSON only: {\"problem_scenario\": \
\"short description of the problem type\", \"student_understanding_level\": 0-10, \
\"teacher_strategies\": [\"at most three strategies that worked\"], \"effectiveness_score\": \
0-10, \"applicable_conditions\": \"when to reuse this approach\"}";

#[derive(Debug, Deserialize)]
struct Distilled {
    #[serde(default)]
    problem_scenario: String,
    #[serde(default, deserialize_with = "lenient_number")]
    student_understanding_level: Option<f64>,
    #[serde(default)]
    teacher_strategies: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    effectiveness_score: Option<f64>,
    #[serde(default)]
    applicable_conditions: String,
}

pub struct ReflectionActor<S> {
    llm: Collaborator,
    store: S,
    stored: u32,
}

impl<S: ExperienceStore + 'static> ReflectionActor<S> {
    pub fn new(llm: Collaborator, store: S) -> Self {
        Self {
            llm,
            store,
            stored: 0,
        }
    }

    async fn on_reflection_request(
        &mut self,
        ctx: &mut ActorContext,
        message: Message,
    ) -> Result<(), ActorError> {
        let Payload::ReflectionRequest(request) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };

        let report = self.reflect(request).await;
        if report.stored {
            self.stored += 1;
            ctx.set("experiences_stored", self.stored);
        }
        ctx.reply(
            &message,
            MessageKind::ReflectionResponse,
            Payload::ReflectionReport(report),
        )?;
        Ok(())
    }

    async fn reflect(&self, request: &ReflectionRequest) -> ReflectionReport {
        let mut report = ReflectionReport {
            conversation_id: request.conversation_id.clone(),
            stored: false,
            experience_key: None,
            experience: None,
        };
        if request.history.is_empty() {
            info!(conversation_id = %request.conversation_id, "empty history, nothing to reflect on");
            return report;
        }

        let Some(record) = self.distill(request).await else {
            warn!(conversation_id = %request.conversation_id, "reflection produced no experience");
            return report;
        };
        let key = record.key(request.history.len());

        match self.store.save(&key, &record).await {
            Ok(()) => {
                info!(conversation_id = %request.conversation_id, %key, "experience stored");
                report.stored = true;
            }
            Err(err) => {
                warn!(conversation_id = %request.conversation_id, error = %err, "failed to store experience");
            }
        }
        report.experience_key = Some(key);
        report.experience = Some(record);
        report
    }

    async fn distill(&self, request: &ReflectionRequest) -> Option<ExperienceRecord> {
        let prompt = Prompt::new("reflection")
            .system(REFLECTION_PROMPT)
            .user(format!(
                "Problem: {}\n\nConversation:\n{}",
                request.problem,
                render_history(&request.history)
            ))
            .temperature(0.3)
            .max_tokens(600);
        let distilled: Distilled = self.llm.generate_json(prompt).await?;

        let scenario = if distilled.problem_scenario.trim().is_empty() {
            request.problem.clone()
        } else {
            distilled.problem_scenario
        };
        Some(
            ExperienceRecord {
                problem_scenario: scenario,
                student_emotions: request.learner_emotions.clone(),
                student_understanding_level: clamp_score(
                    distilled.student_understanding_level.unwrap_or(0.0),
                ),
                teacher_strategies: distilled
                    .teacher_strategies
                    .into_iter()
                    .filter(|s| !s.trim().is_empty())
                    .collect(),
                effectiveness_score: clamp_score(distilled.effectiveness_score.unwrap_or(0.0)),
                applicable_conditions: distilled.applicable_conditions,
                recorded_at: Some(Utc::now()),
            }
            .normalized(),
        )
    }
}

fn render_history(history: &[HistoryEntry]) -> String {
    history
        .iter()
        .map(|entry| format!("[round {}] {}: {}", entry.round, entry.sender, entry.content))
        .collect::<Vec<_>>()
        .join("\n")
}

impl<S: ExperienceStore + 'static> Actor for ReflectionActor<S> {
    fn name(&self) -> &str {
        REFLECTION
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on(MessageKind::ReflectionRequest, |a, c, m| {
            Box::pin(a.on_reflection_request(c, m))
        });
    }
}
