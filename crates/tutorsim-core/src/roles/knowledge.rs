//! Knowledge tracker: summarizes the learner's exercise history.

use serde::Deserialize;
use tracing::{debug, info};

use tutorsim_types::knowledge::{ExerciseRecord, KnowledgeState};
use tutorsim_types::message::{KnowledgeSummary, Message, MessageKind, Payload};

use super::KNOWLEDGE;
use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::llm::{Collaborator, Prompt};

pub(crate) const ANALYSIS_PROMPT: &str = "You analyse a student's exercise history. Each \
line is an exercise with its knowledge points and whether the answer was correct. Respond with \
JSON only: {\"overall_assessment\": \"one or two sentences\", \"strong_points\": [\"...\"], \
\"weak_points\": [\"...\"]}";

#[derive(Debug, Default, Deserialize)]
struct Assessment {
    #[serde(default)]
    overall_assessment: String,
    #[serde(default)]
    strong_points: Vec<String>,
    #[serde(default)]
    weak_points: Vec<String>,
}

pub struct KnowledgeActor {
    llm: Collaborator,
    records: Vec<ExerciseRecord>,
    /// Summary computed on the first request and reused afterwards.
    cached: Option<KnowledgeState>,
}

impl KnowledgeActor {
    pub fn new(llm: Collaborator, records: Vec<ExerciseRecord>) -> Self {
        Self {
            llm,
            records,
            cached: None,
        }
    }

    async fn on_analysis_request(
        &mut self,
        ctx: &mut ActorContext,
        message: Message,
    ) -> Result<(), ActorError> {
        let Payload::AnalysisRequest(request) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };

        let state = match &self.cached {
            Some(state) => state.clone(),
            None => {
                let state = self.summarize().await;
                info!(
                    records = self.records.len(),
                    accuracy = state.accuracy,
                    "knowledge state summarized"
                );
                self.cached = Some(state.clone());
                state
            }
        };
        ctx.set("accuracy", f64::from(state.accuracy));

        ctx.reply(
            &message,
            MessageKind::AnalysisResponse,
            Payload::KnowledgeSummary(KnowledgeSummary {
                conversation_id: request.conversation_id.clone(),
                state,
            }),
        )?;
        Ok(())
    }

    /// Model assessment layered over the computed summary. Accuracy always
    /// comes from the records; empty model fields keep the computed ones.
    async fn summarize(&self) -> KnowledgeState {
        let computed = KnowledgeState::from_records(&self.records);
        if self.records.is_empty() {
            return computed;
        }

        let prompt = Prompt::new("knowledge_analysis")
            .system(ANALYSIS_PROMPT)
            .user(render_records(&self.records))
            .temperature(0.3)
            .max_tokens(500);
        let Some(assessment) = self.llm.generate_json::<Assessment>(prompt).await else {
            debug!("using computed knowledge summary");
            return computed;
        };

        KnowledgeState {
            overall_assessment: non_empty(assessment.overall_assessment)
                .unwrap_or(computed.overall_assessment),
            strong_points: non_empty_list(assessment.strong_points).unwrap_or(computed.strong_points),
            weak_points: non_empty_list(assessment.weak_points).unwrap_or(computed.weak_points),
            accuracy: computed.accuracy,
        }
    }
}

fn render_records(records: &[ExerciseRecord]) -> String {
    records
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "{}. {} [{}] {}",
                i + 1,
                r.question,
                r.knowledge_points.join(", "),
                if r.is_correct { "correct" } else { "wrong" }
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn non_empty(text: String) -> Option<String> {
    (!text.trim().is_empty()).then_some(text)
}

fn non_empty_list(items: Vec<String>) -> Option<Vec<String>> {
    (!items.is_empty()).then_some(items)
}

impl Actor for KnowledgeActor {
    fn name(&self) -> &str {
        KNOWLEDGE
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table.on(MessageKind::AnalysisRequest, |a, c, m| {
            Box::pin(a.on_analysis_request(c, m))
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use tutorsim_types::message::AnalysisRequest;

    use crate::roles::TEACHER;
    use crate::testing::{ScriptedProvider, bus_pair, collaborator, drain};

    fn records() -> Vec<ExerciseRecord> {
        vec![
            ExerciseRecord {
                question: "2x + 3 = 7".to_string(),
                knowledge_points: vec!["linear equations".to_string()],
                is_correct: true,
            },
            ExerciseRecord {
                question: "x² - 4 = 0".to_string(),
                knowledge_points: vec!["factoring".to_string()],
                is_correct: false,
            },
        ]
    }

    fn request() -> Message {
        Message::new(
            TEACHER,
            KNOWLEDGE,
            MessageKind::AnalysisRequest,
            Payload::AnalysisRequest(AnalysisRequest {
                conversation_id: Some("c1".to_string()),
            }),
        )
    }

    fn summary_of(message: &Message) -> &KnowledgeSummary {
        match &message.payload {
            Payload::KnowledgeSummary(summary) => summary,
            other => panic!("expected knowledge summary, got {}", other.variant()),
        }
    }

    #[tokio::test]
    async fn model_assessment_overrides_text_but_not_accuracy() {
        let provider = ScriptedProvider::replying(
            r#"{"overall_assessment": "Solid on linear work, shaky on factoring.",
                "strong_points": ["linear equations"], "weak_points": []}"#,
        );
        let mut actor = KnowledgeActor::new(collaborator(provider), records());
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(KNOWLEDGE, bus);

        actor.on_analysis_request(&mut ctx, request()).await.unwrap();

        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, TEACHER);
        assert_eq!(sent[0].kind, MessageKind::AnalysisResponse);
        let summary = summary_of(&sent[0]);
        assert_eq!(summary.conversation_id.as_deref(), Some("c1"));
        assert_eq!(
            summary.state.overall_assessment,
            "Solid on linear work, shaky on factoring."
        );
        // Empty list from the model keeps the computed weak points.
        assert_eq!(summary.state.weak_points, vec!["factoring".to_string()]);
        assert_eq!(summary.state.accuracy, 0.5);
    }

    #[tokio::test]
    async fn failing_service_uses_computed_summary() {
        let mut actor = KnowledgeActor::new(collaborator(ScriptedProvider::failing()), records());
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(KNOWLEDGE, bus);

        actor.on_analysis_request(&mut ctx, request()).await.unwrap();

        let sent = drain(&mut queue);
        assert_eq!(summary_of(&sent[0]).state, KnowledgeState::from_records(&records()));
    }

    #[tokio::test]
    async fn summary_is_cached_and_empty_history_skips_the_model() {
        let provider = ScriptedProvider::replying("{}");
        let calls = provider.call_counter();
        let mut actor = KnowledgeActor::new(collaborator(provider), Vec::new());
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(KNOWLEDGE, bus);

        actor.on_analysis_request(&mut ctx, request()).await.unwrap();
        actor.on_analysis_request(&mut ctx, request()).await.unwrap();

        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 2);
        assert_eq!(
            summary_of(&sent[1]).state.overall_assessment,
            "No exercise history available."
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn records_render_one_per_line() {
        let text = render_records(&records());
        assert_eq!(
            text,
            "1. 2x + 3 = 7 [linear equations] correct\n2. x² - 4 = 0 [factoring] wrong"
        );
    }
}
