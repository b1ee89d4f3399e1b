//! Learner exercise history.
//!
//! Records come from a JSON array of `{question, knowledge_points,
//! is_correct}` objects. Without a configured file the built-in algebra
//! samples are used.

use std::path::Path;

use tutorsim_types::error::StoreError;
use tutorsim_types::knowledge::ExerciseRecord;

/// Load exercise records from `path`, or the samples when `path` is `None`.
pub async fn load_exercise_records(path: Option<&Path>) -> Result<Vec<ExerciseRecord>, StoreError> {
    let Some(path) = path else {
        tracing::debug!("no exercise records configured, using samples");
        return Ok(sample_records());
    };

    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|err| StoreError::Io {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    let records: Vec<ExerciseRecord> =
        serde_json::from_str(&content).map_err(|err| StoreError::Corrupt {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
    tracing::debug!(path = %path.display(), count = records.len(), "exercise records loaded");
    Ok(records)
}

/// Built-in algebra history: solid on linear equations, weak on factoring.
pub fn sample_records() -> Vec<ExerciseRecord> {
    let record = |question: &str, points: &[&str], is_correct| ExerciseRecord {
        question: question.to_string(),
        knowledge_points: points.iter().map(|p| p.to_string()).collect(),
        is_correct,
    };
    vec![
        record("Solve 2x + 3 = 11", &["linear equations"], true),
        record("Solve 5x - 7 = 3x + 1", &["linear equations", "combining like terms"], true),
        record("Factor x² - 9", &["factoring", "difference of squares"], false),
        record("Solve x² - 5x + 6 = 0", &["quadratic equations", "factoring"], false),
        record("Expand (x + 2)(x + 4)", &["polynomial multiplication"], true),
    ]
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;
    use tutorsim_types::knowledge::KnowledgeState;

    use super::*;

    #[tokio::test]
    async fn no_path_uses_samples() {
        let records = load_exercise_records(None).await.unwrap();
        assert_eq!(records, sample_records());
    }

    #[test]
    fn samples_have_strong_and_weak_points() {
        let state = KnowledgeState::from_records(&sample_records());
        assert!(state.strong_points.contains(&"linear equations".to_string()));
        assert!(state.weak_points.contains(&"factoring".to_string()));
        assert!((state.accuracy - 0.6).abs() < 1e-6);
    }

    #[tokio::test]
    async fn loads_json_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("records.json");
        tokio::fs::write(
            &path,
            r#"[{"question": "1 + 1", "knowledge_points": ["addition"], "is_correct": true},
                {"question": "2 × 3", "is_correct": false}]"#,
        )
        .await
        .unwrap();

        let records = load_exercise_records(Some(&path)).await.unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[1].knowledge_points.is_empty());
    }

    #[tokio::test]
    async fn missing_or_malformed_file_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let missing = tmp.path().join("nope.json");
        assert!(matches!(
            load_exercise_records(Some(&missing)).await,
            Err(StoreError::Io { .. })
        ));

        let bad = tmp.path().join("bad.json");
        tokio::fs::write(&bad, "{}").await.unwrap();
        assert!(matches!(
            load_exercise_records(Some(&bad)).await,
            Err(StoreError::Corrupt { .. })
        ));
    }
}
