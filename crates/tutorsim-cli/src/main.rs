//! tutorsim entry point.
//!
//! Binary name: `tutorsim`
//!
//! Parses CLI arguments, sets up tracing, then dispatches to the command
//! handler.

mod cli;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Shell completions need neither tracing nor config
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "tutorsim", &mut std::io::stdout());
        return Ok(());
    }

    tutorsim_observe::init_tracing(cli.verbose, cli.log_json, cli.otel)
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let config_path = cli.config.as_deref();
    let result = match cli.command {
        Commands::Run(args) => cli::run::run(config_path, args, cli.json).await,
        Commands::Config => cli::config::show_config(config_path, cli.json).await,
        Commands::Experiences { path } => {
            cli::experiences::show_experiences(config_path, path.as_deref(), cli.json).await
        }
        Commands::Completions { .. } => Ok(()),
    };

    tutorsim_observe::shutdown_tracing();
    result
}
