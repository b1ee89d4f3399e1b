//! Simulated learner.
//!
//! Opens the conversation with a question about the problem, then answers
//! each tutor reply. Before answering it re-assesses its own emotion, which
//! travels with the turn so the orchestrator and tutor can see it.

use tracing::debug;

use tutorsim_types::config::LearnerConfig;
use tutorsim_types::message::{Message, MessageKind, Payload, Turn};

use super::{ORCHESTRATOR, STUDENT, TEACHER, normalize_emotion, render_dialogue};
use crate::actor::{Actor, ActorContext, ActorError, HandlerTable};
use crate::llm::{Collaborator, Prompt};

/// Turns of dialogue included in the reply prompt.
const REPLY_CONTEXT_TURNS: usize = 6;

pub(crate) const OPENING_PROMPT: &str = "You are role-playing a student asking a tutor for \
help with a math problem. Write the student's first message in the first person: state the \
problem and what confuses you, in one to three sentences. Output only the message.";

pub(crate) const EMOTION_PROMPT: &str = "You track how a student feels during tutoring. \
Given the student's persona, their current emotion and the tutor's latest reply, answer with \
one lowercase word naming the student's emotion now (for example: confused, anxious, \
frustrated, curious, relieved, confident).";

pub(crate) const REPLY_PROMPT: &str = "You are role-playing a student in a tutoring \
conversation. Stay in character and reply to the tutor in one to three sentences, showing \
what you now understand and asking about what is still unclear. Only when you can solve the \
whole problem yourself, say \"I understand\". Output only the student's message.";

pub(crate) const REPLY_FALLBACK: &str =
    "Sorry, I'm still not sure I follow. Could you explain that step again?";

pub(crate) fn opening_fallback(problem: &str) -> String {
    format!("I'm stuck on this problem: {problem}. I don't even know where to start.")
}

pub struct StudentActor {
    llm: Collaborator,
    persona: String,
    emotion: String,
    conversation_id: String,
    problem: String,
    /// `(speaker, content)` pairs, oldest first.
    dialogue: Vec<(String, String)>,
    turns_taken: u32,
}

impl StudentActor {
    pub fn new(llm: Collaborator, learner: &LearnerConfig) -> Self {
        Self {
            llm,
            persona: learner.persona.clone(),
            emotion: learner.initial_emotion.clone(),
            conversation_id: String::new(),
            problem: String::new(),
            dialogue: Vec::new(),
            turns_taken: 0,
        }
    }

    pub fn emotion(&self) -> &str {
        &self.emotion
    }

    async fn on_start(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::StartConversation(start) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        self.conversation_id = start.conversation_id.clone();
        self.problem = start.problem.clone();

        let prompt = Prompt::new("student_opening")
            .system(OPENING_PROMPT)
            .user(format!(
                "Persona: {}\nCurrent emotion: {}\nProblem: {}",
                self.persona, self.emotion, self.problem
            ))
            .temperature(0.8);
        let opening = self
            .llm
            .generate(prompt)
            .await
            .unwrap_or_else(|| opening_fallback(&self.problem));

        self.send_turn(ctx, opening, message.correlation_id.clone())
    }

    async fn on_tutor_reply(&mut self, ctx: &mut ActorContext, message: Message) -> Result<(), ActorError> {
        let Payload::Turn(turn) = &message.payload else {
            return Err(ActorError::unexpected(&message));
        };
        self.dialogue.push((TEACHER.to_string(), turn.content.clone()));

        self.emotion = self.assess_emotion(&turn.content).await;
        debug!(emotion = %self.emotion, round = turn.round, "student emotion updated");

        let start = self.dialogue.len().saturating_sub(REPLY_CONTEXT_TURNS);
        let prompt = Prompt::new("student_reply")
            .system(REPLY_PROMPT)
            .user(format!(
                "Persona: {}\nCurrent emotion: {}\nProblem: {}\n\nRecent conversation:\n{}\n\n\
                 Reply to the tutor's latest message.",
                self.persona,
                self.emotion,
                self.problem,
                render_dialogue(&self.dialogue[start..])
            ))
            .temperature(0.8);
        let reply = self
            .llm
            .generate(prompt)
            .await
            .unwrap_or_else(|| REPLY_FALLBACK.to_string());

        self.send_turn(ctx, reply, message.correlation_id.clone())
    }

    /// One-word emotion label; keeps the current emotion when the service
    /// fails or answers with something unusable.
    async fn assess_emotion(&self, tutor_reply: &str) -> String {
        let prompt = Prompt::new("student_emotion")
            .system(EMOTION_PROMPT)
            .user(format!(
                "Persona: {}\nCurrent emotion: {}\nTutor's reply: {tutor_reply}",
                self.persona, self.emotion
            ))
            .temperature(0.3)
            .max_tokens(10);
        self.llm
            .generate(prompt)
            .await
            .and_then(|text| normalize_emotion(&text))
            .unwrap_or_else(|| self.emotion.clone())
    }

    fn send_turn(
        &mut self,
        ctx: &mut ActorContext,
        content: String,
        correlation_id: Option<String>,
    ) -> Result<(), ActorError> {
        self.turns_taken += 1;
        self.dialogue.push((STUDENT.to_string(), content.clone()));
        ctx.set("turns_taken", self.turns_taken);
        ctx.set("emotion", self.emotion.clone());

        let turn = Turn {
            conversation_id: self.conversation_id.clone(),
            speaker: STUDENT.to_string(),
            content,
            round: self.turns_taken,
            emotion: Some(self.emotion.clone()),
        };
        ctx.send(ORCHESTRATOR, MessageKind::Request, Payload::Turn(turn), correlation_id)?;
        Ok(())
    }
}

impl Actor for StudentActor {
    fn name(&self) -> &str {
        STUDENT
    }

    fn register_handlers(table: &mut HandlerTable<Self>) {
        table
            .on(MessageKind::Request, |a, c, m| Box::pin(a.on_start(c, m)))
            .on(MessageKind::Response, |a, c, m| Box::pin(a.on_tutor_reply(c, m)));
    }
}
