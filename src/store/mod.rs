use crate::core::error::StoreError;
use std::collections::HashSet;

pub mod json;

/// Durable per-scan set of already-notified symbols. Exclusively owned by
/// the orchestrator for the duration of a run.
pub trait SeenStore: Send + Sync + 'static {
    /// Missing state loads as an empty set; unparseable state is `Corrupt`
    /// and the caller decides how to degrade.
    fn load(&self, scan_id: &str) -> Result<HashSet<String>, StoreError>;

    /// Must replace the record atomically: a crash mid-save never leaves a
    /// partial file visible.
    fn save(&self, scan_id: &str, seen: &HashSet<String>) -> Result<(), StoreError>;
}
