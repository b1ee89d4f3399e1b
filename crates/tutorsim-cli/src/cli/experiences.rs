//! `tutorsim experiences`: experience bank statistics.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;

use tutorsim_core::repository::ExperienceStore;
use tutorsim_infra::config::load_effective_config;
use tutorsim_infra::storage::JsonExperienceBank;
use tutorsim_types::experience::{ExperienceRecord, ExperienceStats};

use super::experience_bank_path;

/// Recent experiences shown in the table.
const TABLE_LIMIT: usize = 10;

pub async fn show_experiences(
    config_path: Option<&Path>,
    bank_override: Option<&Path>,
    json: bool,
) -> Result<()> {
    let bank_path = match bank_override {
        Some(path) => path.to_path_buf(),
        None => experience_bank_path(&load_effective_config(config_path).await?.output),
    };
    let bank = JsonExperienceBank::new(&bank_path);
    let entries = bank
        .load_all()
        .await
        .with_context(|| format!("failed to read experience bank {}", bank_path.display()))?;
    let stats = ExperienceStats::from_bank(&entries);

    if json {
        let output = serde_json::json!({
            "path": bank_path.display().to_string(),
            "stats": stats,
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!(
        "  {} Experience bank {}",
        style("📚").bold(),
        style(bank_path.display()).dim()
    );
    println!();

    if stats.total == 0 {
        println!("  {}", style("No experiences recorded yet.").dim());
        println!();
        return Ok(());
    }

    println!("  {}", style("── Summary ──").dim());
    println!("  Experiences:          {}", style(stats.total).bold());
    println!(
        "  Avg. understanding:   {:.1}/10",
        stats.average_understanding
    );
    println!(
        "  Avg. effectiveness:   {:.1}/10",
        stats.average_effectiveness
    );
    if !stats.top_strategies.is_empty() {
        println!();
        println!("  {}", style("── Top strategies ──").dim());
        for (strategy, count) in &stats.top_strategies {
            println!("  {count:>3}  {strategy}");
        }
    }
    println!();

    println!("{}", experience_table(&entries));
    println!();
    Ok(())
}

/// Most recent experiences first; undated ones last, by key.
fn experience_table(entries: &BTreeMap<String, ExperienceRecord>) -> Table {
    let mut rows: Vec<_> = entries.iter().collect();
    rows.sort_by(|a, b| b.1.recorded_at.cmp(&a.1.recorded_at));

    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec![
        Cell::new("Key").fg(Color::White),
        Cell::new("Scenario").fg(Color::White),
        Cell::new("Understanding").fg(Color::White),
        Cell::new("Effectiveness").fg(Color::White),
        Cell::new("Strategies").fg(Color::White),
    ]);

    for (key, experience) in rows.into_iter().take(TABLE_LIMIT) {
        table.add_row(vec![
            Cell::new(key).fg(Color::Cyan),
            Cell::new(truncate(&experience.problem_scenario, 40)),
            score_cell(experience.student_understanding_level),
            score_cell(experience.effectiveness_score),
            Cell::new(experience.teacher_strategies.join(", ")).fg(Color::DarkGrey),
        ]);
    }
    table
}

fn score_cell(score: u8) -> Cell {
    let color = match score {
        8..=10 => Color::Green,
        5..=7 => Color::Yellow,
        _ => Color::Red,
    };
    Cell::new(format!("{score}/10")).fg(color)
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let head: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{head}...")
}
