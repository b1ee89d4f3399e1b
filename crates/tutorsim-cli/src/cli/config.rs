//! `tutorsim config`: print the effective configuration.

use std::path::Path;

use anyhow::{Context, Result};

use tutorsim_infra::config::load_effective_config;
use tutorsim_types::config::SimulationConfig;

/// Print the configuration a `run` would use, as TOML or JSON.
pub async fn show_config(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_effective_config(config_path).await?;
    println!("{}", render(&config, json)?);
    Ok(())
}

fn render(config: &SimulationConfig, json: bool) -> Result<String> {
    if json {
        serde_json::to_string_pretty(config).context("failed to serialize config")
    } else {
        toml::to_string_pretty(config).context("failed to serialize config")
    }
}
