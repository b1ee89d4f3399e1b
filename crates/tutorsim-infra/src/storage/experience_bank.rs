//! JSON file experience bank.
//!
//! The whole bank is one JSON object mapping experience keys to records.
//! `save` is a read-modify-write of that object followed by an atomic
//! replace (write to a sibling temp file, then rename), so readers never see
//! a half-written file. Within a simulation only the reflection actor
//! writes, which keeps the read-modify-write free of lost updates.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tutorsim_core::repository::ExperienceStore;
use tutorsim_types::error::StoreError;
use tutorsim_types::experience::ExperienceRecord;

/// Experience bank stored at a single JSON file path.
#[derive(Debug, Clone)]
pub struct JsonExperienceBank {
    path: PathBuf,
}

impl JsonExperienceBank {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the bank. A missing file is an empty bank.
    async fn read(&self) -> Result<BTreeMap<String, ExperienceRecord>, StoreError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Ok(BTreeMap::new());
            }
            Err(err) => return Err(io_error(&self.path, err)),
        };
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content).map_err(|err| StoreError::Corrupt {
            path: self.path.clone(),
            message: err.to_string(),
        })
    }

    async fn write(&self, bank: &BTreeMap<String, ExperienceRecord>) -> Result<(), StoreError> {
        let json = serde_json::to_string_pretty(bank)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| io_error(parent, err))?;
        }

        let tmp = temp_path(&self.path);
        tokio::fs::write(&tmp, json)
            .await
            .map_err(|err| io_error(&tmp, err))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|err| io_error(&self.path, err))
    }
}

impl ExperienceStore for JsonExperienceBank {
    async fn save(&self, key: &str, record: &ExperienceRecord) -> Result<(), StoreError> {
        let mut bank = self.read().await?;
        let replaced = bank.insert(key.to_string(), record.clone()).is_some();
        self.write(&bank).await?;
        tracing::debug!(
            path = %self.path.display(),
            %key,
            replaced,
            total = bank.len(),
            "experience saved"
        );
        Ok(())
    }

    async fn load_all(&self) -> Result<BTreeMap<String, ExperienceRecord>, StoreError> {
        self.read().await
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "experience_bank.json".into());
    name.push(".tmp");
    path.with_file_name(name)
}

fn io_error(path: &Path, err: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn record(scenario: &str, effectiveness: u8) -> ExperienceRecord {
        ExperienceRecord {
            problem_scenario: scenario.to_string(),
            student_emotions: vec!["confused".to_string()],
            student_understanding_level: 7,
            teacher_strategies: vec!["guided questioning".to_string()],
            effectiveness_score: effectiveness,
            applicable_conditions: "beginners".to_string(),
            recorded_at: None,
        }
    }

    #[tokio::test]
    async fn missing_file_is_empty_bank() {
        let tmp = TempDir::new().unwrap();
        let bank = JsonExperienceBank::new(tmp.path().join("bank.json"));
        assert!(bank.load_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn save_then_load_keeps_existing_entries() {
        let tmp = TempDir::new().unwrap();
        let bank = JsonExperienceBank::new(tmp.path().join("nested").join("bank.json"));

        bank.save("a", &record("quadratics", 8)).await.unwrap();
        bank.save("b", &record("fractions", 6)).await.unwrap();
        bank.save("a", &record("quadratics", 9)).await.unwrap();

        let loaded = bank.load_all().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded["a"].effectiveness_score, 9);
        assert_eq!(loaded["b"].problem_scenario, "fractions");
        assert!(!temp_path(bank.path()).exists());
    }

    #[tokio::test]
    async fn file_is_a_json_object_keyed_by_experience() {
        let tmp = TempDir::new().unwrap();
        let bank = JsonExperienceBank::new(tmp.path().join("bank.json"));
        bank.save("quadratic _confused_5", &record("quadratics", 8)).await.unwrap();

        let raw = tokio::fs::read_to_string(bank.path()).await.unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let entry = &value["quadratic _confused_5"];
        assert_eq!(entry["student_understanding_level"], 7);
        assert_eq!(entry["teacher_strategies"][0], "guided questioning");
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bank.json");
        tokio::fs::write(&path, "[not a map").await.unwrap();

        let bank = JsonExperienceBank::new(&path);
        assert!(matches!(
            bank.load_all().await,
            Err(StoreError::Corrupt { .. })
        ));
        // A corrupt bank is never overwritten.
        assert!(bank.save("k", &record("x", 1)).await.is_err());
        assert_eq!(tokio::fs::read_to_string(&path).await.unwrap(), "[not a map");
    }

    #[test]
    fn temp_file_sits_next_to_bank() {
        let tmp = temp_path(Path::new("/data/bank.json"));
        assert_eq!(tmp, PathBuf::from("/data/bank.json.tmp"));
    }
}
