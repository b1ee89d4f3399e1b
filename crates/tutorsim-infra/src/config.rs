//! Configuration loader for tutorsim.
//!
//! Reads `tutorsim.toml` (or an explicit path) into [`SimulationConfig`],
//! then applies environment overrides and validates the result. A missing
//! file means defaults; a malformed file is an error, since running a long
//! simulation with silently ignored settings is worse than not running.

use std::path::{Path, PathBuf};

use secrecy::SecretString;

use tutorsim_types::config::{LlmConfig, SimulationConfig};
use tutorsim_types::error::ConfigError;

/// Config file looked up in the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "tutorsim.toml";

pub const ENV_BASE_URL: &str = "LLM_BASE_URL";
pub const ENV_MODEL: &str = "LLM_MODEL";
pub const ENV_MAX_ROUNDS: &str = "MAX_CONVERSATION_ROUNDS";
pub const ENV_ENABLE_MONITORING: &str = "ENABLE_MONITORING";
pub const ENV_ENABLE_KNOWLEDGE: &str = "ENABLE_KNOWLEDGE_ANALYSIS";

/// Load the configuration file.
///
/// - No file at the resolved path: [`SimulationConfig::default()`].
/// - Unreadable or unparseable file: [`ConfigError`].
pub async fn load_config(path: Option<&Path>) -> Result<SimulationConfig, ConfigError> {
    let path = path.map_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE), Path::to_path_buf);

    let content = match tokio::fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config file at {}, using defaults", path.display());
            return Ok(SimulationConfig::default());
        }
        Err(err) => {
            return Err(ConfigError::Read {
                path,
                message: err.to_string(),
            });
        }
    };

    toml::from_str(&content).map_err(|err| ConfigError::Parse {
        path,
        message: err.to_string(),
    })
}

/// Load, apply overrides from the process environment, and validate.
pub async fn load_effective_config(path: Option<&Path>) -> Result<SimulationConfig, ConfigError> {
    let mut config = load_config(path).await?;
    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;
    validate(&config)?;
    Ok(config)
}

/// Apply environment overrides. `lookup` abstracts the environment so tests
/// do not mutate process state.
pub fn apply_env_overrides(
    config: &mut SimulationConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(base_url) = get(ENV_BASE_URL) {
        config.llm.base_url = base_url;
    }
    if let Some(model) = get(ENV_MODEL) {
        config.llm.model = model;
    }
    if let Some(raw) = get(ENV_MAX_ROUNDS) {
        config.conversation.max_rounds =
            raw.trim()
                .parse()
                .map_err(|_| ConfigError::InvalidOverride {
                    name: ENV_MAX_ROUNDS.to_string(),
                    value: raw.clone(),
                })?;
    }
    if let Some(raw) = get(ENV_ENABLE_MONITORING) {
        config.review.enabled = parse_flag(ENV_ENABLE_MONITORING, &raw)?;
    }
    if let Some(raw) = get(ENV_ENABLE_KNOWLEDGE) {
        config.knowledge.enabled = parse_flag(ENV_ENABLE_KNOWLEDGE, &raw)?;
    }
    Ok(())
}

fn parse_flag(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            name: name.to_string(),
            value: raw.to_string(),
        }),
    }
}

/// Reject settings the runtime cannot work with.
pub fn validate(config: &SimulationConfig) -> Result<(), ConfigError> {
    if config.conversation.max_rounds == 0 {
        return Err(ConfigError::Invalid("conversation.max_rounds must be at least 1".into()));
    }
    if config.review.max_attempts == 0 {
        return Err(ConfigError::Invalid("review.max_attempts must be at least 1".into()));
    }
    for (name, score) in [
        ("review.pass_score", config.review.pass_score),
        ("review.min_aspect_score", config.review.min_aspect_score),
    ] {
        if !(0.0..=10.0).contains(&score) {
            return Err(ConfigError::Invalid(format!("{name} must be between 0 and 10")));
        }
    }
    if config.llm.model.trim().is_empty() {
        return Err(ConfigError::Invalid("llm.model must not be empty".into()));
    }
    Ok(())
}

/// Read the API key from the variable named by `llm.api_key_env`.
pub fn resolve_api_key(
    config: &LlmConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    lookup(&config.api_key_env)
        .filter(|key| !key.trim().is_empty())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::MissingApiKey(config.api_key_env.clone()))
}
