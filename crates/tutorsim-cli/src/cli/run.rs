//! `tutorsim run`: one simulated tutoring conversation.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, bail};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};

use tutorsim_core::llm::{BoxLlmProvider, Collaborator, GenerationDefaults};
use tutorsim_core::{Simulation, SimulationOutcome};
use tutorsim_infra::config::{load_effective_config, resolve_api_key, validate};
use tutorsim_infra::llm::OpenAiCompatibleProvider;
use tutorsim_infra::records::load_exercise_records;
use tutorsim_infra::storage::{JsonExperienceBank, TranscriptPaths, write_transcript};
use tutorsim_types::config::SimulationConfig;

use super::{RunArgs, experience_bank_path};

/// Problem file read when neither `--problem` nor `--problem-file` is given.
const DEFAULT_PROBLEM_FILE: &str = "problem.txt";

pub async fn run(config_path: Option<&Path>, args: RunArgs, json: bool) -> Result<()> {
    let mut config = load_effective_config(config_path).await?;
    apply_run_args(&mut config, &args);
    validate(&config)?;

    let problem = resolve_problem(&args).await?;
    let api_key = resolve_api_key(&config.llm, |name| std::env::var(name).ok())?;
    let provider = OpenAiCompatibleProvider::new(&config.llm, api_key)
        .context("failed to set up the generation service")?;
    tracing::info!(
        endpoint = provider.endpoint(),
        model = provider.model(),
        "generation service configured"
    );
    let llm = Collaborator::new(
        Arc::new(BoxLlmProvider::new(provider)),
        GenerationDefaults::from(&config.llm),
    );

    let records = if config.knowledge.enabled {
        load_exercise_records(config.knowledge.records_path.as_deref())
            .await
            .context("failed to load exercise records")?
    } else {
        Vec::new()
    };

    let bank = JsonExperienceBank::new(experience_bank_path(&config.output));
    let bank_path = bank.path().to_path_buf();
    let output_dir = config.output.dir.clone();

    let spinner = (!json).then(|| {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg} ({elapsed})")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        spinner.set_message("Simulating conversation...");
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    });

    let started = Instant::now();
    let outcome = Simulation::new(config, llm, bank)
        .with_exercise_records(records)
        .run(&problem)
        .await;
    if let Some(spinner) = &spinner {
        spinner.finish_and_clear();
    }
    let outcome = outcome.context("simulation failed")?;

    let paths = write_transcript(&output_dir, &outcome.transcript)
        .await
        .context("failed to write transcript")?;

    if json {
        print_json(&outcome, &paths, &bank_path)?;
    } else {
        print_summary(&outcome, &paths, &bank_path, started.elapsed());
    }
    Ok(())
}

/// Command-line flags win over the file and environment.
fn apply_run_args(config: &mut SimulationConfig, args: &RunArgs) {
    if let Some(rounds) = args.rounds {
        config.conversation.max_rounds = rounds;
    }
    if args.no_review {
        config.review.enabled = false;
    }
    if args.no_knowledge {
        config.knowledge.enabled = false;
    }
    if args.no_reflection {
        config.reflection.enabled = false;
    }
    if let Some(dir) = &args.output {
        config.output.dir = dir.clone();
    }
}

async fn resolve_problem(args: &RunArgs) -> Result<String> {
    if let Some(problem) = &args.problem {
        return non_empty(problem.clone(), "--problem");
    }
    let path = args
        .problem_file
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_PROBLEM_FILE));
    let content = tokio::fs::read_to_string(&path).await.with_context(|| {
        format!(
            "no problem given: pass --problem or --problem-file (could not read {})",
            path.display()
        )
    })?;
    non_empty(content, &path.display().to_string())
}

fn non_empty(problem: String, source: &str) -> Result<String> {
    let trimmed = problem.trim();
    if trimmed.is_empty() {
        bail!("problem from {source} is empty");
    }
    Ok(trimmed.to_string())
}

fn print_json(outcome: &SimulationOutcome, paths: &TranscriptPaths, bank: &Path) -> Result<()> {
    let transcript = &outcome.transcript;
    let summary = serde_json::json!({
        "conversation_id": transcript.conversation_id,
        "total_rounds": transcript.total_rounds,
        "end_reason": transcript.end_reason.as_ref().map(ToString::to_string),
        "messages": transcript.conversation_history.len(),
        "transcript": {
            "json": paths.json.display().to_string(),
            "text": paths.text.display().to_string(),
        },
        "reflection": outcome.reflection,
        "experience_bank": bank.display().to_string(),
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn print_summary(
    outcome: &SimulationOutcome,
    paths: &TranscriptPaths,
    bank: &Path,
    elapsed: Duration,
) {
    let transcript = &outcome.transcript;

    println!();
    println!(
        "  {} Conversation {} finished in {:.1}s",
        style("✓").green().bold(),
        style(&transcript.conversation_id).cyan(),
        elapsed.as_secs_f64()
    );
    println!();

    println!("  {}", style("── Conversation ──").dim());
    println!("  Rounds:     {}", style(transcript.total_rounds).bold());
    println!("  Messages:   {}", transcript.conversation_history.len());
    if let Some(reason) = &transcript.end_reason {
        println!("  Ended:      {reason}");
    }
    println!();

    println!("  {}", style("── Reflection ──").dim());
    match &outcome.reflection {
        Some(report) if report.stored => {
            println!(
                "  Stored as:  {}",
                style(report.experience_key.as_deref().unwrap_or("-")).green()
            );
            if let Some(experience) = &report.experience {
                println!(
                    "  Scores:     understanding {}/10, effectiveness {}/10",
                    experience.student_understanding_level, experience.effectiveness_score
                );
            }
            println!("  Bank:       {}", style(bank.display()).dim());
        }
        Some(_) => println!("  {}", style("No experience stored").yellow()),
        None => println!("  {}", style("Skipped").dim()),
    }
    println!();

    println!("  {}", style("── Files ──").dim());
    println!("  Transcript: {}", style(paths.json.display()).dim());
    println!("  Readable:   {}", style(paths.text.display()).dim());
    println!();
}
