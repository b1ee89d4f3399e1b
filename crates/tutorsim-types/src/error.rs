use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration. These are the only errors
/// allowed to abort a run.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {message}")]
    Read { path: PathBuf, message: String },

    #[error("failed to parse config file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("environment variable {name} has an invalid value '{value}'")]
    InvalidOverride { name: String, value: String },

    #[error("API key not found: set the {0} environment variable")]
    MissingApiKey(String),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Errors from file-backed stores (experience bank, transcripts, records).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("corrupt data in {path}: {message}")]
    Corrupt { path: PathBuf, message: String },

    #[error("serialization error: {0}")]
    Serialization(String),
}
