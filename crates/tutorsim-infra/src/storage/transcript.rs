//! Transcript files for completed conversations.
//!
//! Each conversation produces `conversation_{id}.json` (the persisted
//! transcript record) and `conversation_{id}.txt` (a readable rendering).

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tutorsim_types::conversation::TranscriptRecord;
use tutorsim_types::error::StoreError;
use tutorsim_types::message::MessageKind;

/// Where a transcript was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptPaths {
    pub json: PathBuf,
    pub text: PathBuf,
}

/// Write both transcript files into `dir`, creating it if needed.
pub async fn write_transcript(
    dir: &Path,
    transcript: &TranscriptRecord,
) -> Result<TranscriptPaths, StoreError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|err| io_error(dir, err))?;

    let stem = format!("conversation_{}", transcript.conversation_id);
    let paths = TranscriptPaths {
        json: dir.join(format!("{stem}.json")),
        text: dir.join(format!("{stem}.txt")),
    };

    let json = serde_json::to_string_pretty(transcript)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    tokio::fs::write(&paths.json, json)
        .await
        .map_err(|err| io_error(&paths.json, err))?;
    tokio::fs::write(&paths.text, render_transcript_text(transcript))
        .await
        .map_err(|err| io_error(&paths.text, err))?;

    tracing::info!(
        conversation_id = %transcript.conversation_id,
        path = %paths.json.display(),
        "transcript written"
    );
    Ok(paths)
}

/// Plain-text rendering: a header, then one block per utterance.
pub fn render_transcript_text(transcript: &TranscriptRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Conversation {}", transcript.conversation_id);
    let _ = writeln!(out, "Problem: {}", transcript.problem_content);
    let _ = writeln!(out, "Rounds: {}", transcript.total_rounds);
    let _ = writeln!(
        out,
        "Started: {}",
        transcript.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    if let Some(ended) = transcript.ended_at {
        let _ = writeln!(out, "Ended: {}", ended.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    if let Some(reason) = &transcript.end_reason {
        let _ = writeln!(out, "End reason: {reason}");
    }
    out.push_str(&"=".repeat(60));
    out.push('\n');

    for entry in &transcript.conversation_history {
        let label = match entry.kind {
            MessageKind::Request | MessageKind::Response => entry.sender.clone(),
            other => format!("{} ({other})", entry.sender),
        };
        let _ = writeln!(out, "\n[round {}] {label}:", entry.round);
        let _ = writeln!(out, "{}", entry.content);
    }
    out
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}
