//! Learner exercise history and the knowledge-state summary derived from it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// One historical exercise attempt by the learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExerciseRecord {
    pub question: String,
    #[serde(default)]
    pub knowledge_points: Vec<String>,
    pub is_correct: bool,
}

/// Summary of what the learner has and has not mastered.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeState {
    #[serde(default)]
    pub overall_assessment: String,
    #[serde(default)]
    pub strong_points: Vec<String>,
    #[serde(default)]
    pub weak_points: Vec<String>,
    /// Share of correct attempts in `[0, 1]`.
    #[serde(default)]
    pub accuracy: f32,
}

impl KnowledgeState {
    /// Derive a summary directly from the records, without any model call.
    ///
    /// A knowledge point is strong when every attempt touching it was
    /// correct and weak when at least one attempt was wrong.
    pub fn from_records(records: &[ExerciseRecord]) -> Self {
        if records.is_empty() {
            return Self {
                overall_assessment: "No exercise history available.".to_string(),
                ..Default::default()
            };
        }

        let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
        for record in records {
            for point in &record.knowledge_points {
                let entry = tally.entry(point.as_str()).or_default();
                entry.0 += 1;
                if record.is_correct {
                    entry.1 += 1;
                }
            }
        }

        let (strong_points, weak_points): (Vec<_>, Vec<_>) =
            tally.iter().partition(|(_, (total, correct))| total == correct);

        let correct = records.iter().filter(|r| r.is_correct).count();
        let accuracy = correct as f32 / records.len() as f32;

        Self {
            overall_assessment: format!(
                "Answered {correct} of {} exercises correctly ({:.0}%).",
                records.len(),
                accuracy * 100.0
            ),
            strong_points: strong_points.into_iter().map(|(p, _)| p.to_string()).collect(),
            weak_points: weak_points.into_iter().map(|(p, _)| p.to_string()).collect(),
            accuracy,
        }
    }

    /// Render as a short paragraph suitable for a prompt.
    pub fn describe(&self) -> String {
        let list = |points: &[String]| {
            if points.is_empty() {
                "none".to_string()
            } else {
                points.join(", ")
            }
        };
        format!(
            "{} Strong: {}. Weak: {}.",
            self.overall_assessment,
            list(&self.strong_points),
            list(&self.weak_points)
        )
    }
}
