//! Simulation configuration types.
//!
//! `SimulationConfig` mirrors `tutorsim.toml`. Every section and field has a
//! default, so an empty file (or no file at all) yields a runnable setup.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Top-level configuration for a simulation run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub review: ReviewConfig,
    pub knowledge: KnowledgeConfig,
    pub reflection: ReflectionConfig,
    pub learner: LearnerConfig,
    pub runtime: RuntimeConfig,
    pub output: OutputConfig,
}

/// Generation service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// OpenAI-compatible endpoint base, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub model: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "LLM_API_KEY".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
            timeout_secs: 120,
        }
    }
}

/// Round limits and termination rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConversationConfig {
    pub max_rounds: u32,
    /// Case-insensitive phrases that end the conversation when spoken.
    pub closing_keywords: Vec<String>,
    /// Ask the generation service whether the learner has understood.
    pub semantic_judge: bool,
    /// Overall deadline for one conversation.
    pub timeout_secs: u64,
    /// Only turns from this participant advance the round counter.
    pub round_initiator: String,
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_rounds: 7,
            closing_keywords: vec![
                "I understand".to_string(),
                "got it".to_string(),
                "thank you".to_string(),
                "that's all".to_string(),
            ],
            semantic_judge: false,
            timeout_secs: 300,
            round_initiator: "student".to_string(),
        }
    }
}

/// Tutor draft review settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    pub enabled: bool,
    /// Drafts per round before the latest one is delivered unreviewed.
    pub max_attempts: u32,
    /// Minimum overall score for approval.
    pub pass_score: f32,
    /// Minimum score for each of the emotional and professional aspects.
    pub min_aspect_score: f32,
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_attempts: 3,
            pass_score: 7.0,
            min_aspect_score: 6.0,
        }
    }
}

/// Knowledge tracker settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub enabled: bool,
    /// JSON file of exercise records. Built-in samples are used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub records_path: Option<PathBuf>,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            records_path: None,
        }
    }
}

/// Experience extraction after each conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReflectionConfig {
    pub enabled: bool,
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Simulated learner persona.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LearnerConfig {
    pub persona: String,
    pub initial_emotion: String,
    /// Emotion tags recorded with each experience.
    pub emotion_tags: Vec<String>,
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            persona: "a high-school student who tries hard but gets nervous when stuck".to_string(),
            initial_emotion: "confused".to_string(),
            emotion_tags: vec!["confused".to_string(), "anxious".to_string()],
        }
    }
}

/// Actor runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// How long `stop` waits for a worker before giving up.
    pub stop_timeout_ms: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            stop_timeout_ms: 5_000,
        }
    }
}

/// Where transcripts and experiences are written.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub experience_bank: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("run_output"),
            experience_bank: PathBuf::from("experience_bank.json"),
        }
    }
}
