//! One tutoring conversation from start to finish.
//!
//! A [`Simulation`] wires a fresh event bus, registers one actor per role,
//! starts the conversation, and waits for the orchestrator to report the
//! outcome. The conversation deadline is enforced here: when it elapses the
//! orchestrator is told to end the conversation and gets a grace period to
//! finish the handshake and the reflection.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{info, warn};
use uuid::Uuid;

use tutorsim_types::config::SimulationConfig;
use tutorsim_types::conversation::{EndReason, TranscriptRecord};
use tutorsim_types::knowledge::ExerciseRecord;
use tutorsim_types::message::{
    ControlAction, ControlCommand, Message, MessageKind, Payload, ReflectionReport,
};

use crate::actor::{ActorHandle, ActorSettings, StopOutcome};
use crate::conversation::{ConversationTracker, TerminationPolicy, UnderstandingJudge};
use crate::llm::Collaborator;
use crate::message::{BusError, EventBus};
use crate::repository::ExperienceStore;
use crate::roles::{
    KNOWLEDGE, KnowledgeActor, MONITOR, MonitorActor, ORCHESTRATOR, OrchestratorActor,
    ReflectionActor, STUDENT, StudentActor, TEACHER, TeacherActor,
};

/// Sender name of control messages issued by the harness.
pub const HARNESS: &str = "harness";

/// Result of a completed simulation.
#[derive(Debug, Clone)]
pub struct SimulationOutcome {
    pub transcript: TranscriptRecord,
    /// `None` when reflection is disabled or its request was lost.
    pub reflection: Option<ReflectionReport>,
}

#[derive(Debug, Error)]
pub enum SimulationError {
    #[error("conversation did not complete within {0:?}")]
    Timeout(Duration),

    #[error("orchestrator stopped before reporting an outcome")]
    Aborted,

    #[error(transparent)]
    Bus(#[from] BusError),
}

pub struct Simulation<S> {
    config: SimulationConfig,
    llm: Collaborator,
    store: S,
    exercise_records: Vec<ExerciseRecord>,
}

impl<S: ExperienceStore + 'static> Simulation<S> {
    pub fn new(config: SimulationConfig, llm: Collaborator, store: S) -> Self {
        Self {
            config,
            llm,
            store,
            exercise_records: Vec::new(),
        }
    }

    /// Exercise history summarized by the knowledge tracker.
    pub fn with_exercise_records(mut self, records: Vec<ExerciseRecord>) -> Self {
        self.exercise_records = records;
        self
    }

    /// Run one conversation about `problem` and tear everything down.
    #[tracing::instrument(name = "simulation", skip_all, fields(conversation_id))]
    pub async fn run(self, problem: &str) -> Result<SimulationOutcome, SimulationError> {
        let conversation_id = Uuid::now_v7().to_string();
        tracing::Span::current().record("conversation_id", conversation_id.as_str());

        let config = &self.config;
        let settings = ActorSettings::from(&config.runtime);
        let bus = EventBus::new();

        let mut participants = vec![STUDENT.to_string(), TEACHER.to_string()];
        if config.review.enabled {
            participants.push(MONITOR.to_string());
        }
        if config.knowledge.enabled {
            participants.push(KNOWLEDGE.to_string());
        }

        let mut policy = TerminationPolicy::from_config(&config.conversation);
        if config.conversation.semantic_judge {
            policy = policy.with_judge(UnderstandingJudge::new(self.llm.clone()));
        }
        let tracker = ConversationTracker::new(
            ORCHESTRATOR,
            bus.sender(),
            policy,
            config.conversation.round_initiator.clone(),
        );

        let (completion_tx, mut completion_rx) = oneshot::channel();
        let mut handles: Vec<Arc<ActorHandle>> = vec![
            ActorHandle::new(
                OrchestratorActor::new(
                    tracker,
                    participants,
                    config.reflection.enabled,
                    config.learner.emotion_tags.clone(),
                    completion_tx,
                ),
                bus.sender(),
                settings,
            ),
            ActorHandle::new(
                StudentActor::new(self.llm.clone(), &config.learner),
                bus.sender(),
                settings,
            ),
            ActorHandle::new(
                TeacherActor::new(self.llm.clone(), &config.review, config.knowledge.enabled),
                bus.sender(),
                settings,
            ),
        ];
        if config.review.enabled {
            handles.push(ActorHandle::new(
                MonitorActor::new(self.llm.clone(), &config.review),
                bus.sender(),
                settings,
            ));
        }
        if config.knowledge.enabled {
            handles.push(ActorHandle::new(
                KnowledgeActor::new(self.llm.clone(), self.exercise_records.clone()),
                bus.sender(),
                settings,
            ));
        }
        if config.reflection.enabled {
            handles.push(ActorHandle::new(
                ReflectionActor::new(self.llm.clone(), self.store),
                bus.sender(),
                settings,
            ));
        }

        for handle in &handles {
            bus.register(Arc::clone(handle));
            handle.start().await;
        }
        bus.start().await;
        info!(problem, actors = handles.len(), "simulation started");

        let conversation_timeout = Duration::from_secs(config.conversation.timeout_secs);
        // One in-flight turn plus the reflection call.
        let grace =
            Duration::from_secs(config.llm.timeout_secs.saturating_mul(2)) + settings.stop_timeout;
        let outcome = drive(
            &bus,
            &conversation_id,
            problem,
            &mut completion_rx,
            conversation_timeout,
            grace,
        )
        .await;

        for handle in handles.iter().rev() {
            if handle.stop().await == StopOutcome::TimedOut {
                warn!(actor = handle.name(), "actor left running after shutdown");
            }
        }
        bus.stop(settings.stop_timeout).await;

        match &outcome {
            Ok(done) => info!(
                rounds = done.transcript.total_rounds,
                reflection_stored = done.reflection.as_ref().is_some_and(|r| r.stored),
                "simulation finished"
            ),
            Err(err) => warn!(error = %err, "simulation failed"),
        }
        outcome
    }
}

/// Begin the conversation and wait for its outcome, ending it on timeout.
async fn drive(
    bus: &EventBus,
    conversation_id: &str,
    problem: &str,
    completion: &mut oneshot::Receiver<SimulationOutcome>,
    deadline: Duration,
    grace: Duration,
) -> Result<SimulationOutcome, SimulationError> {
    bus.send(control(
        conversation_id,
        ControlAction::Begin {
            problem: problem.to_string(),
        },
    ))?;

    match tokio::time::timeout(deadline, &mut *completion).await {
        Ok(Ok(outcome)) => return Ok(outcome),
        Ok(Err(_)) => return Err(SimulationError::Aborted),
        Err(_) => warn!(
            timeout_secs = deadline.as_secs(),
            "conversation deadline reached, ending"
        ),
    }

    bus.send(control(
        conversation_id,
        ControlAction::End {
            reason: EndReason::Timeout,
        },
    ))?;
    match tokio::time::timeout(grace, completion).await {
        Ok(Ok(outcome)) => Ok(outcome),
        Ok(Err(_)) => Err(SimulationError::Aborted),
        Err(_) => Err(SimulationError::Timeout(deadline + grace)),
    }
}

fn control(conversation_id: &str, action: ControlAction) -> Message {
    Message::new(
        HARNESS,
        ORCHESTRATOR,
        MessageKind::SystemControl,
        Payload::Control(ControlCommand {
            conversation_id: conversation_id.to_string(),
            action,
        }),
    )
    .with_correlation(Some(conversation_id.to_string()))
}
