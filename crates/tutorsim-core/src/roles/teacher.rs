//! Socratic tutor.
//!
//! For every learner turn the tutor runs a four-step pipeline: emotion
//! analysis, intent inference, strategy selection, reply drafting. When review
//! is enabled the draft goes to the monitor and is regenerated with the
//! monitor's feedback until approved or the attempt budget runs out, at which
//! point the latest draft is delivered anyway.
//!
//! Before its first reply the tutor asks the knowledge tracker for a summary
//! of the learner's history and holds the turn until the answer arrives.

use tracing::{debug, info, warn};
use uuid::Uuid;

use tutorsim_types::config::ReviewConfig;
use tutorsim_types::knowledge::KnowledgeState;
use tutorsim_types::message::{
    AnalysisRequest, Message, MessageKind, Payload, ReviewRequest, ReviewVerdict, Turn,
};

use super::{
    KNOWLEDGE, MONITOR, ORCHESTRATOR, STUDENT, TEACHER, normalize_emotion, render_dialogue,
};
use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::llm::{Collaborator, Prompt};

const CONTEXT_TURNS: usize = 6;

pub(crate) const EMOTION_PROMPT: &str = "You read a student's message in a tutoring session \
and identify how they feel. Answer with one lowercase word (for example: confused, anxious, \
frustrated, curious, confident).";

pub(crate) const INTENT_PROMPT: &str = "You read a student's message in a tutoring session. \
In one sentence, state what the student wants or needs right now.";

pub(crate) const STRATEGY_PROMPT: &str = "You choose Socratic teaching strategies. Given the \
student's emotion, intent and knowledge state, name the single best strategy for the next \
reply as a short phrase (for example: guided questioning, worked sub-step, encouragement then \
hint, analogy, check understanding).";

pub(crate) const REPLY_PROMPT: &str = "You are a patient Socratic math tutor. Do not give the \
final answer outright; guide the student with questions and small hints. Briefly acknowledge \
their feelings when they are struggling. Keep the reply under 120 words and output only the \
reply.";

pub(crate) const FALLBACK_EMOTION: &str = "neutral";
pub(crate) const FALLBACK_INTENT: &str = "wants help with the next step";
pub(crate) const FALLBACK_STRATEGY: &str = "guided questioning";
pub(crate) const FALLBACK_REPLY: &str = "I understand your confusion. Let's work through this \
together, one small step at a time. What do you already know about this problem?";

/// Result of the analysis steps for one learner turn.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnAnalysis {
    pub emotion: String,
    pub intent: String,
    pub strategy: String,
}

#[derive(Debug)]
enum KnowledgeStatus {
    Disabled,
    NotRequested,
    /// Waiting on the analysis request with this message ID.
    Pending(Uuid),
    Ready(KnowledgeState),
    Unavailable,
}

/// A learner turn and its correlation ID.
#[derive(Debug, Clone)]
struct PendingTurn {
    turn: Turn,
    correlation_id: Option<String>,
}

/// Draft waiting for the monitor's verdict.
#[derive(Debug)]
struct DraftInFlight {
    pending: PendingTurn,
    analysis: TurnAnalysis,
    draft: String,
    attempt: u32,
}

pub struct TeacherActor {
    llm: Collaborator,
    /// Attempt budget when review is enabled.
    review_attempts: Option<u32>,
    knowledge: KnowledgeStatus,
    /// Turn held back until the knowledge summary arrives.
    waiting: Option<PendingTurn>,
    in_flight: Option<DraftInFlight>,
    /// Message ID of the latest review request.
    review_request: Option<Uuid>,
    dialogue: Vec<(String, String)>,
}

impl TeacherActor {
    pub fn new(llm: Collaborator, review: &ReviewConfig, knowledge_enabled: bool) -> Self {
        Self {
            llm,
            review_attempts: review.enabled.then_some(review.max_attempts.max(1)),
            knowledge: if knowledge_enabled {
                KnowledgeStatus::NotRequested
            } else {
                KnowledgeStatus::Disabled
            },
            waiting: None,
            in_flight: None,
            review_request: None,
            dialogue: Vec::new(),
        }
    }

    async fn on_learner_turn(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Turn(turn) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        let pending = PendingTurn {
            turn: turn.clone(),
            correlation_id: message.correlation_id.clone(),
        };
        self.dialogue.push((STUDENT.to_string(), turn.content.clone()));

        match self.knowledge {
            KnowledgeStatus::NotRequested => {
                let request_id = ctx.send(
                    KNOWLEDGE,
                    MessageKind::AnalysisRequest,
                    Payload::AnalysisRequest(AnalysisRequest {
                        conversation_id: Some(turn.conversation_id.clone()),
                    }),
                    message.correlation_id.clone(),
                )?;
                self.knowledge = KnowledgeStatus::Pending(request_id);
                self.waiting = Some(pending);
                debug!("waiting for knowledge summary before first reply");
                Ok(())
            }
            KnowledgeStatus::Pending(_) => {
                self.waiting = Some(pending);
                Ok(())
            }
            _ => self.respond(ctx, pending).await,
        }
    }

    async fn on_knowledge(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::KnowledgeSummary(summary) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        info!(
            accuracy = summary.state.accuracy,
            weak_points = summary.state.weak_points.len(),
            "knowledge summary received"
        );
        self.knowledge = KnowledgeStatus::Ready(summary.state.clone());
        match self.waiting.take() {
            Some(pending) => self.respond(ctx, pending).await,
            None => Ok(()),
        }
    }

    /// Delivery failures come back as error notices. A lost knowledge
    /// request or review request must not leave the learner's turn stranded;
    /// notices about any other message change nothing.
    async fn on_error_notice(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Error(notice) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        let failed = notice.original_message_id;
        warn!(reason = %notice.reason, %failed, "tutor received error notice");

        if matches!(self.knowledge, KnowledgeStatus::Pending(id) if id == failed) {
            self.knowledge = KnowledgeStatus::Unavailable;
            return match self.waiting.take() {
                Some(pending) => self.respond(ctx, pending).await,
                None => Ok(()),
            };
        }
        if self.review_request != Some(failed) {
            return Ok(());
        }
        match self.in_flight.take() {
            Some(in_flight) => {
                warn!(
                    round = in_flight.pending.turn.round,
                    "review unavailable, delivering draft unreviewed"
                );
                self.deliver(ctx, in_flight.pending, in_flight.draft)
            }
            None => Ok(()),
        }
    }

    async fn on_verdict(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::ReviewVerdict(verdict) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        let Some(in_flight) = self.in_flight.take() else {
            warn!(round = verdict.round, attempt = verdict.attempt, "verdict without a draft in flight");
            return Ok(());
        };
        if verdict.round != in_flight.pending.turn.round || verdict.attempt != in_flight.attempt {
            warn!(
                round = verdict.round,
                attempt = verdict.attempt,
                "stale verdict ignored"
            );
            self.in_flight = Some(in_flight);
            return Ok(());
        }

        let max_attempts = self.review_attempts.unwrap_or(1);
        if verdict.approved {
            debug!(attempt = verdict.attempt, score = verdict.overall_score, "draft approved");
            return self.deliver(ctx, in_flight.pending, in_flight.draft);
        }
        if in_flight.attempt >= max_attempts {
            warn!(
                attempts = in_flight.attempt,
                "review attempts exhausted, delivering latest draft"
            );
            return self.deliver(ctx, in_flight.pending, in_flight.draft);
        }

        let draft = self
            .regenerate(&in_flight.pending.turn, &in_flight.analysis, &in_flight.draft, verdict)
            .await;
        self.submit(
            ctx,
            DraftInFlight {
                draft,
                attempt: in_flight.attempt + 1,
                ..in_flight
            },
        )
    }

    async fn respond(&mut self, ctx: &mut ActorContext, pending: PendingTurn) -> Result<(), ActorError> {
        let analysis = self.analyze(&pending.turn).await;
        let draft = self.compose(&analysis).await;
        ctx.set("last_strategy", analysis.strategy.clone());

        if self.review_attempts.is_some() {
            self.submit(
                ctx,
                DraftInFlight {
                    pending,
                    analysis,
                    draft,
                    attempt: 1,
                },
            )
        } else {
            self.deliver(ctx, pending, draft)
        }
    }

    /// Emotion, intent, strategy. Each step falls back independently.
    async fn analyze(&self, turn: &Turn) -> TurnAnalysis {
        let emotion = self
            .llm
            .generate(
                Prompt::new("tutor_emotion")
                    .system(EMOTION_PROMPT)
                    .user(format!("Student: {}", turn.content))
                    .temperature(0.3)
                    .max_tokens(10),
            )
            .await
            .and_then(|text| normalize_emotion(&text))
            .unwrap_or_else(|| FALLBACK_EMOTION.to_string());

        let intent = self
            .llm
            .generate(
                Prompt::new("tutor_intent")
                    .system(INTENT_PROMPT)
                    .user(format!(
                        "Recent conversation:\n{}\n\nLatest student message: {}",
                        self.recent_dialogue(),
                        turn.content
                    ))
                    .temperature(0.3)
                    .max_tokens(300),
            )
            .await
            .unwrap_or_else(|| FALLBACK_INTENT.to_string());

        let strategy = self
            .llm
            .generate(
                Prompt::new("tutor_strategy")
                    .system(STRATEGY_PROMPT)
                    .user(format!(
                        "Emotion: {emotion}\nIntent: {intent}\nKnowledge state: {}",
                        self.knowledge_description()
                    ))
                    .temperature(0.4)
                    .max_tokens(100),
            )
            .await
            .unwrap_or_else(|| FALLBACK_STRATEGY.to_string());

        debug!(%emotion, %intent, %strategy, "turn analysed");
        TurnAnalysis {
            emotion,
            intent,
            strategy,
        }
    }

    async fn compose(&self, analysis: &TurnAnalysis) -> String {
        let prompt = Prompt::new("tutor_reply")
            .system(REPLY_PROMPT)
            .user(format!(
                "{}\n\nRecent conversation:\n{}\n\nWrite the tutor's next reply.",
                self.brief(analysis),
                self.recent_dialogue()
            ))
            .temperature(0.7)
            .max_tokens(300);
        self.llm
            .generate(prompt)
            .await
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }

    async fn regenerate(
        &self,
        turn: &Turn,
        analysis: &TurnAnalysis,
        rejected: &str,
        verdict: &ReviewVerdict,
    ) -> String {
        let feedback = verdict.feedback.as_deref().unwrap_or(&verdict.reason);
        debug!(round = turn.round, attempt = verdict.attempt, %feedback, "regenerating draft");
        let prompt = Prompt::new("tutor_regenerate")
            .system(REPLY_PROMPT)
            .user(format!(
                "{}\n\nRecent conversation:\n{}\n\nA reviewer rejected this draft:\n{rejected}\n\n\
                 Reviewer feedback: {feedback}\n\nWrite an improved reply.",
                self.brief(analysis),
                self.recent_dialogue()
            ))
            .temperature(0.8)
            .max_tokens(300);
        self.llm
            .generate(prompt)
            .await
            .unwrap_or_else(|| FALLBACK_REPLY.to_string())
    }

    fn submit(&mut self, ctx: &mut ActorContext, in_flight: DraftInFlight) -> Result<(), ActorError> {
        let turn = &in_flight.pending.turn;
        let request_id = ctx.send(
            MONITOR,
            MessageKind::ReviewRequest,
            Payload::ReviewRequest(ReviewRequest {
                conversation_id: turn.conversation_id.clone(),
                round: turn.round,
                attempt: in_flight.attempt,
                learner_message: turn.content.clone(),
                learner_emotion: Some(in_flight.analysis.emotion.clone()),
                draft: in_flight.draft.clone(),
            }),
            in_flight.pending.correlation_id.clone(),
        )?;
        debug!(round = turn.round, attempt = in_flight.attempt, "draft submitted for review");
        self.review_request = Some(request_id);
        self.in_flight = Some(in_flight);
        Ok(())
    }

    fn deliver(&mut self, ctx: &mut ActorContext, pending: PendingTurn, content: String) -> Result<(), ActorError> {
        self.dialogue.push((TEACHER.to_string(), content.clone()));
        let reply = Turn {
            conversation_id: pending.turn.conversation_id,
            speaker: TEACHER.to_string(),
            content,
            round: pending.turn.round,
            emotion: None,
        };
        ctx.send(
            ORCHESTRATOR,
            MessageKind::Response,
            Payload::Turn(reply),
            pending.correlation_id,
        )?;
        Ok(())
    }

    fn brief(&self, analysis: &TurnAnalysis) -> String {
        format!(
            "Student emotion: {}\nStudent intent: {}\nStrategy to use: {}\nKnowledge state: {}",
            analysis.emotion,
            analysis.intent,
            analysis.strategy,
            self.knowledge_description()
        )
    }

    fn knowledge_description(&self) -> String {
        match &self.knowledge {
            KnowledgeStatus::Ready(state) => state.describe(),
            _ => "unknown".to_string(),
        }
    }

    fn recent_dialogue(&self) -> String {
        let start = self.dialogue.len().saturating_sub(CONTEXT_TURNS);
        render_dialogue(&self.dialogue[start..])
    }
}

impl Actor for TeacherActor {
    fn name(&self) -> &str {
        TEACHER
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table
            .on(MessageKind::Request, |a, c, m| Box::pin(a.on_learner_turn(c, m)))
            .on(MessageKind::AnalysisResponse, |a, c, m| Box::pin(a.on_knowledge(c, m)))
            .on(MessageKind::ReviewResponse, |a, c, m| Box::pin(a.on_verdict(c, m)))
            .on(MessageKind::Error, |a, c, m| Box::pin(a.on_error_notice(c, m)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tutorsim_types::message::KnowledgeSummary;

    use crate::testing::{ScriptedProvider, bus_pair, collaborator, drain, last_user, system_of};

    fn learner_turn(round: u32) -> Message {
        Message::new(
            ORCHESTRATOR,
            TEACHER,
            MessageKind::Request,
            Payload::Turn(Turn {
                conversation_id: "c1".to_string(),
                speaker: STUDENT.to_string(),
                content: "I don't get how to factor this".to_string(),
                round,
                emotion: Some("confused".to_string()),
            }),
        )
        .with_correlation(Some("c1".to_string()))
    }

    fn verdict(round: u32, attempt: u32, approved: bool, feedback: Option<&str>) -> Message {
        Message::new(
            MONITOR,
            TEACHER,
            MessageKind::ReviewResponse,
            Payload::ReviewVerdict(ReviewVerdict {
                conversation_id: "c1".to_string(),
                round,
                attempt,
                approved,
                overall_score: if approved { 8.0 } else { 4.0 },
                emotional_score: 5.0,
                professional_score: 5.0,
                reason: "r".to_string(),
                feedback: feedback.map(str::to_string),
            }),
        )
    }

    fn review(enabled: bool, max_attempts: u32) -> ReviewConfig {
        ReviewConfig {
            enabled,
            max_attempts,
            ..ReviewConfig::default()
        }
    }

    /// Drafts "R1", "R2", ... on successive reply generations. A
    /// regeneration without the reviewer's feedback drafts "missing feedback".
    fn drafting_provider() -> ScriptedProvider {
        let counter = std::sync::atomic::AtomicUsize::new(0);
        ScriptedProvider::new(move |req| match system_of(req) {
            EMOTION_PROMPT => Ok("anxious".to_string()),
            INTENT_PROMPT => Ok("wants to learn factoring".to_string()),
            STRATEGY_PROMPT => Ok("guided questioning".to_string()),
            REPLY_PROMPT => {
                let prompt = last_user(req);
                if prompt.contains("rejected") && !prompt.contains("Reviewer feedback: too abrupt") {
                    return Ok("missing feedback".to_string());
                }
                let n = counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst) + 1;
                Ok(format!("R{n}"))
            }
            other => Err(tutorsim_types::llm::LlmError::InvalidRequest(other.to_string())),
        })
    }

    fn payload_turn(message: &Message) -> &Turn {
        match &message.payload {
            Payload::Turn(turn) => turn,
            other => panic!("expected turn, got {}", other.variant()),
        }
    }

    fn payload_review(message: &Message) -> &ReviewRequest {
        match &message.payload {
            Payload::ReviewRequest(review) => review,
            other => panic!("expected review request, got {}", other.variant()),
        }
    }

    #[tokio::test]
    async fn rejected_draft_is_regenerated_and_approved_version_delivered() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(true, 3), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, MONITOR);
        assert_eq!(payload_review(&sent[0]).draft, "R1");
        assert_eq!(payload_review(&sent[0]).attempt, 1);

        teacher
            .on_verdict(&mut ctx, verdict(1, 1, false, Some("too abrupt")))
            .await
            .unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(payload_review(&sent[0]).draft, "R2");
        assert_eq!(payload_review(&sent[0]).attempt, 2);

        teacher.on_verdict(&mut ctx, verdict(1, 2, true, None)).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, ORCHESTRATOR);
        assert_eq!(sent[0].kind, MessageKind::Response);
        assert_eq!(sent[0].correlation_id.as_deref(), Some("c1"));
        assert_eq!(payload_turn(&sent[0]).content, "R2");
        assert_eq!(payload_turn(&sent[0]).round, 1);
    }

    #[tokio::test]
    async fn latest_draft_delivered_when_attempts_run_out() {
        let provider = ScriptedProvider::new(|req| match system_of(req) {
            REPLY_PROMPT if last_user(req).contains("rejected") => Ok("second".to_string()),
            REPLY_PROMPT => Ok("first".to_string()),
            _ => Ok("x".to_string()),
        });
        let mut teacher = TeacherActor::new(collaborator(provider), &review(true, 2), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        teacher
            .on_verdict(&mut ctx, verdict(1, 1, false, Some("more empathy")))
            .await
            .unwrap();
        teacher
            .on_verdict(&mut ctx, verdict(1, 2, false, Some("still cold")))
            .await
            .unwrap();

        let sent = drain(&mut queue);
        let last = sent.last().unwrap();
        assert_eq!(last.recipient, ORCHESTRATOR);
        assert_eq!(payload_turn(last).content, "second");
    }

    #[tokio::test]
    async fn stale_verdict_is_ignored() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(true, 3), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        drain(&mut queue);
        teacher.on_verdict(&mut ctx, verdict(1, 5, true, None)).await.unwrap();
        assert!(drain(&mut queue).is_empty());

        teacher.on_verdict(&mut ctx, verdict(1, 1, true, None)).await.unwrap();
        assert_eq!(payload_turn(&drain(&mut queue)[0]).content, "R1");
    }

    #[tokio::test]
    async fn without_review_reply_goes_straight_to_orchestrator() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(false, 3), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, ORCHESTRATOR);
        assert_eq!(payload_turn(&sent[0]).content, "R1");
        assert_eq!(ctx.get("last_strategy"), Some(&serde_json::json!("guided questioning")));
    }

    #[tokio::test]
    async fn failing_service_produces_fallback_reply() {
        let mut teacher =
            TeacherActor::new(collaborator(ScriptedProvider::failing()), &review(false, 3), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(payload_turn(&sent[0]).content, FALLBACK_REPLY);
    }

    #[tokio::test]
    async fn analysis_falls_back_step_by_step() {
        let provider = ScriptedProvider::new(|req| match system_of(req) {
            INTENT_PROMPT => Ok("wants the first step".to_string()),
            _ => Err(tutorsim_types::llm::LlmError::Timeout),
        });
        let teacher = TeacherActor::new(collaborator(provider), &review(false, 3), false);
        let turn = match learner_turn(1).payload {
            Payload::Turn(turn) => turn,
            _ => unreachable!(),
        };

        let analysis = teacher.analyze(&turn).await;
        assert_eq!(
            analysis,
            TurnAnalysis {
                emotion: FALLBACK_EMOTION.to_string(),
                intent: "wants the first step".to_string(),
                strategy: FALLBACK_STRATEGY.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn first_turn_waits_for_knowledge_summary() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(false, 3), true);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, KNOWLEDGE);
        assert_eq!(sent[0].kind, MessageKind::AnalysisRequest);

        let summary = Message::new(
            KNOWLEDGE,
            TEACHER,
            MessageKind::AnalysisResponse,
            Payload::KnowledgeSummary(KnowledgeSummary {
                conversation_id: Some("c1".to_string()),
                state: KnowledgeState::default(),
            }),
        );
        teacher.on_knowledge(&mut ctx, summary).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, ORCHESTRATOR);

        // Later turns do not ask again.
        teacher.on_learner_turn(&mut ctx, learner_turn(2)).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, ORCHESTRATOR);
    }

    #[tokio::test]
    async fn lost_knowledge_request_releases_held_turn() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(false, 3), true);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        let request_id = drain(&mut queue)[0].id;

        let notice = crate::message::envelope::delivery_failure(TEACHER, request_id, "inbox closed");
        teacher.on_error_notice(&mut ctx, notice).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, ORCHESTRATOR);
    }

    #[tokio::test]
    async fn lost_review_request_delivers_draft() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(true, 3), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        let request_id = drain(&mut queue)[0].id;

        let notice = crate::message::envelope::delivery_failure(TEACHER, request_id, "inbox closed");
        teacher.on_error_notice(&mut ctx, notice).await.unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, ORCHESTRATOR);
        assert_eq!(payload_turn(&sent[0]).content, "R1");
    }

    #[tokio::test]
    async fn unrelated_error_notice_keeps_turn_waiting() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(false, 3), true);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        drain(&mut queue);

        let notice =
            crate::message::envelope::delivery_failure(TEACHER, Uuid::now_v7(), "inbox closed");
        teacher.on_error_notice(&mut ctx, notice).await.unwrap();
        assert!(drain(&mut queue).is_empty());
        assert!(matches!(teacher.knowledge, KnowledgeStatus::Pending(_)));
        assert!(teacher.waiting.is_some());
    }

    #[tokio::test]
    async fn unrelated_error_notice_keeps_draft_under_review() {
        let mut teacher = TeacherActor::new(collaborator(drafting_provider()), &review(true, 3), false);
        let (bus, mut queue) = bus_pair();
        let mut ctx = ActorContext::new(TEACHER, bus);

        teacher.on_learner_turn(&mut ctx, learner_turn(1)).await.unwrap();
        drain(&mut queue);

        let notice =
            crate::message::envelope::delivery_failure(TEACHER, Uuid::now_v7(), "inbox closed");
        teacher.on_error_notice(&mut ctx, notice).await.unwrap();
        assert!(drain(&mut queue).is_empty());
        assert!(teacher.in_flight.is_some());

        // The real verdict still lands.
        teacher
            .on_verdict(&mut ctx, verdict(1, 1, true, None))
            .await
            .unwrap();
        let sent = drain(&mut queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(payload_turn(&sent[0]).content, "R1");
    }
}
