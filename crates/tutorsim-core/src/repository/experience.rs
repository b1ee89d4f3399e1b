//! Experience bank repository trait definition.

use std::collections::BTreeMap;

use tutorsim_types::error::StoreError;
use tutorsim_types::experience::ExperienceRecord;

/// Persistence for distilled teaching experiences.
///
/// Implementations live in tutorsim-infra (e.g., `JsonExperienceBank`). Within
/// a simulation only the reflection actor holds a store, which keeps writes
/// single-threaded.
pub trait ExperienceStore: Send + Sync {
    /// Insert or replace the experience stored under `key`.
    fn save(
        &self,
        key: &str,
        record: &ExperienceRecord,
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;

    /// Load every stored experience, keyed by its bank key.
    fn load_all(
        &self,
    ) -> impl std::future::Future<Output = Result<BTreeMap<String, ExperienceRecord>, StoreError>> + Send;
}
