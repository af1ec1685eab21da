//! Aggregate progress over the per-stage runtime map.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Whether the latest local edits of a stage have reached the remote store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SyncStatus {
    #[default]
    Synced,
    LocalOnly,
}

/// Derived, per-stage view. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRuntimeInfo {
    pub completed: bool,
    pub is_current_stage: bool,
    pub sync_status: SyncStatus,
}

/// Stage number to runtime info. Iteration order is stage order.
pub type StageMap = BTreeMap<u32, StageRuntimeInfo>;

/// Completion summary shown by the dashboard.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total_stages: u32,
    pub completed_stages: u32,
    pub current_stage: u32,
    pub percentage: u32,
}

impl Progress {
    /// Summarize `stages`.
    ///
    /// `current_stage` is the stage flagged current, or 1 when none is.
    pub fn compute(stages: &StageMap) -> Self {
        let total_stages = stages.len() as u32;
        let completed_stages = stages.values().filter(|s| s.completed).count() as u32;
        let current_stage = stages
            .iter()
            .find(|(_, s)| s.is_current_stage)
            .map(|(n, _)| *n)
            .unwrap_or(1);

        Self {
            total_stages,
            completed_stages,
            current_stage,
            percentage: percentage(completed_stages, total_stages),
        }
    }
}

/// `round(completed / total * 100)` with ties rounding up; 0 when `total` is 0.
pub fn percentage(completed: u32, total: u32) -> u32 {
    if total == 0 {
        return 0;
    }
    let (completed, total) = (u64::from(completed), u64::from(total));
    ((completed * 200 + total) / (total * 2)) as u32
}
