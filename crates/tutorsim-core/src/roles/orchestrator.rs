//! Conversation orchestrator.
//!
//! Owns the conversation tracker and relays turns between learner and tutor.
//! Every learner turn is recorded and checked against the termination policy
//! before the tutor sees it. Once a conversation completes, the orchestrator
//! optionally asks for a reflection and then resolves the harness's
//! completion channel exactly once.

use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use uuid::Uuid;

use tutorsim_types::conversation::{EndReason, TranscriptRecord};
use tutorsim_types::message::{
    ControlAction, Message, MessageKind, Payload, ReflectionReport, ReflectionRequest, Turn,
};

use super::{ORCHESTRATOR, REFLECTION, STUDENT, TEACHER};
use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::conversation::{ConversationTracker, TerminationDecision, TrackerError};
use crate::simulation::SimulationOutcome;

pub struct OrchestratorActor {
    tracker: ConversationTracker,
    participants: Vec<String>,
    reflection_enabled: bool,
    /// Persona tags recorded with the experience.
    learner_emotions: Vec<String>,
    completion: Option<oneshot::Sender<SimulationOutcome>>,
    /// Outstanding reflection request and the transcript it is about.
    awaiting_reflection: Option<(Uuid, TranscriptRecord)>,
}

impl OrchestratorActor {
    pub fn new(
        tracker: ConversationTracker,
        participants: Vec<String>,
        reflection_enabled: bool,
        learner_emotions: Vec<String>,
        completion: oneshot::Sender<SimulationOutcome>,
    ) -> Self {
        Self {
            tracker,
            participants,
            reflection_enabled,
            learner_emotions,
            completion: Some(completion),
            awaiting_reflection: None,
        }
    }

    async fn on_control(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Control(command) = message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        match command.action {
            ControlAction::Begin { problem } => {
                self.tracker.start_conversation(
                    &command.conversation_id,
                    self.participants.clone(),
                    &problem,
                )?;
                ctx.set("conversation_id", command.conversation_id);
                Ok(())
            }
            ControlAction::End { reason } => self.finish(ctx, &command.conversation_id, reason),
        }
    }

    async fn on_learner_turn(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Turn(turn) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        let id = turn.conversation_id.as_str();
        let Some(round) = self.record(id, &message.sender, &turn.content, MessageKind::Request)? else {
            return Ok(());
        };
        ctx.set("round", round);

        match self.tracker.should_terminate(id, &turn.content).await {
            TerminationDecision::End(reason) => self.finish(ctx, id, reason),
            TerminationDecision::Continue => {
                let forwarded = Turn {
                    round,
                    ..turn.clone()
                };
                ctx.send(
                    TEACHER,
                    MessageKind::Request,
                    Payload::Turn(forwarded),
                    message.correlation_id.clone(),
                )?;
                Ok(())
            }
        }
    }

    async fn on_tutor_turn(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Turn(turn) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        if self
            .record(&turn.conversation_id, &message.sender, &turn.content, MessageKind::Response)?
            .is_none()
        {
            return Ok(());
        }
        ctx.send(
            STUDENT,
            MessageKind::Response,
            Payload::Turn(turn.clone()),
            message.correlation_id.clone(),
        )?;
        Ok(())
    }

    async fn on_reflection(&mut self, _ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::ReflectionReport(report) = message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        match self.awaiting_reflection.take() {
            Some((_, transcript)) => {
                info!(
                    conversation_id = %report.conversation_id,
                    stored = report.stored,
                    "reflection finished"
                );
                self.complete(transcript, Some(report));
            }
            None => warn!(conversation_id = %report.conversation_id, "unexpected reflection report"),
        }
        Ok(())
    }

    /// A lost reflection request must still resolve the harness.
    async fn on_error_notice(&mut self, _ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Error(notice) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        warn!(reason = %notice.reason, "orchestrator received error notice");
        match self.awaiting_reflection.take() {
            Some((request_id, transcript)) if request_id == notice.original_message_id => {
                self.complete(transcript, None);
            }
            other => self.awaiting_reflection = other,
        }
        Ok(())
    }

    /// Append an utterance. `None` when the conversation already completed.
    fn record(
        &mut self,
        id: &str,
        sender: &str,
        content: &str,
        kind: MessageKind,
    ) -> Result<Option<u32>, ActorError> {
        match self.tracker.append_message(id, sender, content, kind) {
            Ok(round) => Ok(Some(round)),
            Err(TrackerError::Completed(_)) => {
                debug!(conversation_id = %id, %sender, "turn after completion ignored");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Run the termination handshake, then ask for a reflection or resolve
    /// the harness directly.
    fn finish(&mut self, ctx: &mut ActorContext, id: &str, reason: EndReason) -> Result<(), ActorError> {
        match self.tracker.begin_ending(id, reason) {
            Ok(()) => {}
            Err(TrackerError::Completed(_)) => return Ok(()),
            Err(err) => return Err(err.into()),
        }
        self.tracker.end_conversation(id)?;
        let transcript = self.tracker.transcript(id)?;
        ctx.set("status", "completed");

        if !self.reflection_enabled {
            self.complete(transcript, None);
            return Ok(());
        }

        let request = ReflectionRequest {
            conversation_id: id.to_string(),
            problem: transcript.problem_content.clone(),
            history: transcript.conversation_history.clone(),
            learner_emotions: self.learner_emotions.clone(),
        };
        match ctx.send(
            REFLECTION,
            MessageKind::ReflectionRequest,
            Payload::ReflectionRequest(request),
            Some(id.to_string()),
        ) {
            Ok(request_id) => self.awaiting_reflection = Some((request_id, transcript)),
            Err(err) => {
                warn!(conversation_id = %id, error = %err, "could not request reflection");
                self.complete(transcript, None);
            }
        }
        Ok(())
    }

    fn complete(&mut self, transcript: TranscriptRecord, reflection: Option<ReflectionReport>) {
        let Some(completion) = self.completion.take() else {
            return;
        };
        if completion.send(SimulationOutcome { transcript, reflection }).is_err() {
            debug!("simulation harness no longer waiting");
        }
    }
}

impl Actor for OrchestratorActor {
    fn name(&self) -> &str {
        ORCHESTRATOR
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table
            .on(MessageKind::SystemControl, |a, c, m| Box::pin(a.on_control(c, m)))
            .on(MessageKind::Request, |a, c, m| Box::pin(a.on_learner_turn(c, m)))
            .on(MessageKind::Response, |a, c, m| Box::pin(a.on_tutor_turn(c, m)))
            .on(MessageKind::ReflectionResponse, |a, c, m| Box::pin(a.on_reflection(c, m)))
            .on(MessageKind::Error, |a, c, m| Box::pin(a.on_error_notice(c, m)));
    }
}

#[cfg(test)]
mod tests {
    use tokio::sync::mpsc;

    use super::*;
    use tutorsim_types::conversation::ConversationStatus;
    use tutorsim_types::message::ControlCommand;

    use crate::conversation::TerminationPolicy;
    use crate::message::envelope::delivery_failure;
    use crate::testing::{bus_pair, drain};

    struct Fixture {
        orchestrator: OrchestratorActor,
        ctx: ActorContext,
        queue: mpsc::UnboundedReceiver<Message>,
        outcome: oneshot::Receiver<SimulationOutcome>,
    }

    fn fixture(reflection_enabled: bool, max_rounds: u32) -> Fixture {
        let (bus, queue) = bus_pair();
        let policy = TerminationPolicy::new(max_rounds, vec!["I understand".to_string()]);
        let tracker = ConversationTracker::new(ORCHESTRATOR, bus.clone(), policy, STUDENT);
        let (tx, outcome) = oneshot::channel();
        Fixture {
            orchestrator: OrchestratorActor::new(
                tracker,
                vec![STUDENT.to_string(), TEACHER.to_string()],
                reflection_enabled,
                vec!["confused".to_string()],
                tx,
            ),
            ctx: ActorContext::new(ORCHESTRATOR, bus),
            queue,
            outcome,
        }
    }

    fn control(action: ControlAction) -> Message {
        Message::new(
            "harness",
            ORCHESTRATOR,
            MessageKind::SystemControl,
            Payload::Control(ControlCommand {
                conversation_id: "c1".to_string(),
                action,
            }),
        )
    }

    fn begin() -> Message {
        control(ControlAction::Begin {
            problem: "solve x²+5x+6=0".to_string(),
        })
    }

    fn turn(from: &str, kind: MessageKind, content: &str) -> Message {
        Message::new(
            from,
            ORCHESTRATOR,
            kind,
            Payload::Turn(Turn {
                conversation_id: "c1".to_string(),
                speaker: from.to_string(),
                content: content.to_string(),
                round: 0,
                emotion: None,
            }),
        )
        .with_correlation(Some("c1".to_string()))
    }

    fn turn_of(message: &Message) -> &Turn {
        match &message.payload {
            Payload::Turn(turn) => turn,
            other => panic!("expected turn, got {}", other.variant()),
        }
    }

    #[tokio::test]
    async fn relays_turns_between_learner_and_tutor() {
        let mut f = fixture(false, 7);

        f.orchestrator.on_control(&mut f.ctx, begin()).await.unwrap();
        let sent = drain(&mut f.queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, STUDENT);
        assert!(matches!(sent[0].payload, Payload::StartConversation(_)));

        f.orchestrator
            .on_learner_turn(&mut f.ctx, turn(STUDENT, MessageKind::Request, "How do I start?"))
            .await
            .unwrap();
        let sent = drain(&mut f.queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, TEACHER);
        assert_eq!(sent[0].kind, MessageKind::Request);
        assert_eq!(turn_of(&sent[0]).round, 1);

        f.orchestrator
            .on_tutor_turn(&mut f.ctx, turn(TEACHER, MessageKind::Response, "What multiplies to 6?"))
            .await
            .unwrap();
        let sent = drain(&mut f.queue);
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, STUDENT);
        assert_eq!(sent[0].kind, MessageKind::Response);
        assert_eq!(turn_of(&sent[0]).content, "What multiplies to 6?");
        assert_eq!(f.orchestrator.tracker.history("c1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn closing_keyword_ends_and_requests_reflection() {
        let mut f = fixture(true, 7);
        f.orchestrator.on_control(&mut f.ctx, begin()).await.unwrap();
        drain(&mut f.queue);

        f.orchestrator
            .on_learner_turn(&mut f.ctx, turn(STUDENT, MessageKind::Request, "Oh, I understand now!"))
            .await
            .unwrap();

        let sent = drain(&mut f.queue);
        let notices: Vec<_> = sent
            .iter()
            .filter(|m| m.kind == MessageKind::Termination)
            .map(|m| m.recipient.as_str())
            .collect();
        assert_eq!(notices, vec![STUDENT, TEACHER]);
        let reflection = sent
            .iter()
            .find(|m| m.kind == MessageKind::ReflectionRequest)
            .unwrap();
        assert_eq!(reflection.recipient, REFLECTION);
        assert!(!sent.iter().any(|m| m.recipient == TEACHER && m.kind == MessageKind::Request));
        assert_eq!(f.orchestrator.tracker.status("c1"), Some(ConversationStatus::Completed));

        let report = ReflectionReport {
            conversation_id: "c1".to_string(),
            stored: true,
            experience_key: Some("k".to_string()),
            experience: None,
        };
        let response = reflection.reply(MessageKind::ReflectionResponse, Payload::ReflectionReport(report));
        f.orchestrator.on_reflection(&mut f.ctx, response).await.unwrap();

        let outcome = f.outcome.try_recv().unwrap();
        assert_eq!(outcome.transcript.conversation_id, "c1");
        assert_eq!(outcome.transcript.total_rounds, 1);
        assert!(matches!(
            outcome.transcript.end_reason,
            Some(EndReason::ClosingKeyword { .. })
        ));
        assert!(outcome.reflection.unwrap().stored);
    }

    #[tokio::test]
    async fn without_reflection_completion_is_immediate() {
        let mut f = fixture(false, 1);
        f.orchestrator.on_control(&mut f.ctx, begin()).await.unwrap();
        f.orchestrator
            .on_learner_turn(&mut f.ctx, turn(STUDENT, MessageKind::Request, "hello"))
            .await
            .unwrap();

        let outcome = f.outcome.try_recv().unwrap();
        assert_eq!(
            outcome.transcript.end_reason,
            Some(EndReason::MaxRounds { rounds: 1 })
        );
        assert!(outcome.reflection.is_none());
    }

    #[tokio::test]
    async fn lost_reflection_request_still_completes() {
        let mut f = fixture(true, 7);
        f.orchestrator.on_control(&mut f.ctx, begin()).await.unwrap();
        f.orchestrator
            .on_control(&mut f.ctx, control(ControlAction::End { reason: EndReason::Timeout }))
            .await
            .unwrap();
        let request = drain(&mut f.queue)
            .into_iter()
            .find(|m| m.kind == MessageKind::ReflectionRequest)
            .unwrap();

        let unrelated = delivery_failure(ORCHESTRATOR, Uuid::now_v7(), "inbox closed");
        f.orchestrator.on_error_notice(&mut f.ctx, unrelated).await.unwrap();
        assert!(f.outcome.try_recv().is_err());

        let notice = delivery_failure(ORCHESTRATOR, request.id, "recipient not registered");
        f.orchestrator.on_error_notice(&mut f.ctx, notice).await.unwrap();
        let outcome = f.outcome.try_recv().unwrap();
        assert_eq!(outcome.transcript.end_reason, Some(EndReason::Timeout));
        assert!(outcome.reflection.is_none());
    }

    #[tokio::test]
    async fn turns_after_completion_are_dropped() {
        let mut f = fixture(false, 7);
        f.orchestrator.on_control(&mut f.ctx, begin()).await.unwrap();
        f.orchestrator
            .on_control(&mut f.ctx, control(ControlAction::End { reason: EndReason::Timeout }))
            .await
            .unwrap();
        drain(&mut f.queue);

        f.orchestrator
            .on_tutor_turn(&mut f.ctx, turn(TEACHER, MessageKind::Response, "late reply"))
            .await
            .unwrap();
        f.orchestrator
            .on_control(&mut f.ctx, control(ControlAction::End { reason: EndReason::Timeout }))
            .await
            .unwrap();

        assert!(drain(&mut f.queue).is_empty());
        assert!(f.orchestrator.tracker.history("c1").unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_conversation_turn_is_an_error() {
        let mut f = fixture(false, 7);
        let result = f
            .orchestrator
            .on_learner_turn(&mut f.ctx, turn(STUDENT, MessageKind::Request, "hi"))
            .await;
        assert!(matches!(result, Err(ActorError::Tracker(TrackerError::NotFound(_)))));
    }
}
