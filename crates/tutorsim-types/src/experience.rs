//! Teaching experience records distilled from completed conversations.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Upper bound for understanding and effectiveness scores.
pub const MAX_SCORE: u8 = 10;

/// Maximum number of strategies kept per experience.
pub const MAX_STRATEGIES: usize = 3;

/// One reusable teaching experience.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceRecord {
    pub problem_scenario: String,
    #[serde(default)]
    pub student_emotions: Vec<String>,
    pub student_understanding_level: u8,
    #[serde(default)]
    pub teacher_strategies: Vec<String>,
    pub effectiveness_score: u8,
    #[serde(default)]
    pub applicable_conditions: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorded_at: Option<DateTime<Utc>>,
}

impl ExperienceRecord {
    /// Clamp scores to `0..=MAX_SCORE` and truncate the strategy list.
    pub fn normalized(mut self) -> Self {
        self.student_understanding_level = self.student_understanding_level.min(MAX_SCORE);
        self.effectiveness_score = self.effectiveness_score.min(MAX_SCORE);
        self.teacher_strategies.truncate(MAX_STRATEGIES);
        self
    }

    /// Synthetic bank key: first ten characters of the scenario, the
    /// emotion tags, and the number of history entries, joined by `_`.
    pub fn key(&self, history_len: usize) -> String {
        let scenario: String = self.problem_scenario.chars().take(10).collect();
        let mut parts = vec![scenario];
        parts.extend(self.student_emotions.iter().cloned());
        parts.push(history_len.to_string());
        parts.join("_")
    }
}

/// Convert a model-provided score (possibly fractional or out of range)
/// into `0..=MAX_SCORE`.
pub fn clamp_score(raw: f64) -> u8 {
    if raw.is_nan() {
        return 0;
    }
    raw.round().clamp(0.0, f64::from(MAX_SCORE)) as u8
}

/// Aggregate numbers over an experience bank.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExperienceStats {
    pub total: usize,
    pub average_understanding: f64,
    pub average_effectiveness: f64,
    /// Most frequent strategies, most common first.
    pub top_strategies: Vec<(String, usize)>,
}

impl ExperienceStats {
    pub fn from_bank(bank: &BTreeMap<String, ExperienceRecord>) -> Self {
        if bank.is_empty() {
            return Self::default();
        }
        let total = bank.len();
        let understanding: u32 = bank
            .values()
            .map(|e| u32::from(e.student_understanding_level))
            .sum();
        let effectiveness: u32 = bank.values().map(|e| u32::from(e.effectiveness_score)).sum();

        let mut counts: HashMap<&str, usize> = HashMap::new();
        for strategy in bank.values().flat_map(|e| e.teacher_strategies.iter()) {
            *counts.entry(strategy.as_str()).or_default() += 1;
        }
        let mut top_strategies: Vec<(String, usize)> = counts
            .into_iter()
            .map(|(s, n)| (s.to_string(), n))
            .collect();
        top_strategies.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        top_strategies.truncate(5);

        Self {
            total,
            average_understanding: f64::from(understanding) / total as f64,
            average_effectiveness: f64::from(effectiveness) / total as f64,
            top_strategies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn experience(scenario: &str, strategies: &[&str], effectiveness: u8) -> ExperienceRecord {
        ExperienceRecord {
            problem_scenario: scenario.to_string(),
            student_emotions: vec!["anxious".to_string(), "curious".to_string()],
            student_understanding_level: 6,
            teacher_strategies: strategies.iter().map(|s| s.to_string()).collect(),
            effectiveness_score: effectiveness,
            applicable_conditions: "quadratic equations".to_string(),
            recorded_at: None,
        }
    }

    #[test]
    fn normalized_clamps_and_truncates() {
        let mut raw = experience("factoring", &["a", "b", "c", "d"], 14);
        raw.student_understanding_level = 200;
        let normalized = raw.normalized();
        assert_eq!(normalized.effectiveness_score, MAX_SCORE);
        assert_eq!(normalized.student_understanding_level, MAX_SCORE);
        assert_eq!(normalized.teacher_strategies, vec!["a", "b", "c"]);
    }

    #[test]
    fn clamp_score_handles_out_of_range() {
        assert_eq!(clamp_score(-3.0), 0);
        assert_eq!(clamp_score(7.6), 8);
        assert_eq!(clamp_score(42.0), 10);
        assert_eq!(clamp_score(f64::NAN), 0);
    }

    #[test]
    fn key_uses_scenario_prefix_emotions_and_length() {
        let record = experience("Solving quadratic equations", &[], 5);
        assert_eq!(record.key(12), "Solving qu_anxious_curious_12");
    }

    #[test]
    fn stats_over_bank() {
        let mut bank = BTreeMap::new();
        bank.insert("a".to_string(), experience("x", &["questioning", "analogy"], 8));
        bank.insert("b".to_string(), experience("y", &["questioning"], 6));

        let stats = ExperienceStats::from_bank(&bank);
        assert_eq!(stats.total, 2);
        assert!((stats.average_effectiveness - 7.0).abs() < f64::EPSILON);
        assert_eq!(stats.top_strategies[0], ("questioning".to_string(), 2));
    }

    #[test]
    fn stats_over_empty_bank() {
        let stats = ExperienceStats::from_bank(&BTreeMap::new());
        assert_eq!(stats.total, 0);
        assert!(stats.top_strategies.is_empty());
    }
}
