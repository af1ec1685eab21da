//! Session-scoped draft cache.
//!
//! Holds the last locally edited record per `(actor, stage)` so a stage can
//! still be re-entered while the registration service is unreachable.
//! Nothing here outlives the process.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::debug;

use super::remote::StageData;
use crate::stages::ActorType;

/// A locally cached copy of one stage's data.
#[derive(Debug, Clone, PartialEq)]
pub struct DraftRecord {
    pub data: StageData,
    pub saved_at: DateTime<Utc>,
}

/// In-memory draft store. All operations are synchronous.
#[derive(Debug, Default)]
pub struct LocalDraftStore {
    drafts: Mutex<HashMap<(ActorType, u32), DraftRecord>>,
}

impl LocalDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<(ActorType, u32), DraftRecord>> {
        // A panic while holding the lock cannot leave a half-written record.
        self.drafts.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Overwrite the draft for a stage.
    pub fn save(&self, actor: ActorType, stage: u32, data: &StageData) {
        debug!(actor = %actor, stage, fields = data.len(), "Saving local draft");
        self.lock().insert(
            (actor, stage),
            DraftRecord {
                data: data.clone(),
                saved_at: Utc::now(),
            },
        );
    }

    /// The last saved data for a stage, if any.
    pub fn load(&self, actor: ActorType, stage: u32) -> Option<StageData> {
        self.record(actor, stage).map(|r| r.data)
    }

    /// The full draft record, including when it was saved.
    pub fn record(&self, actor: ActorType, stage: u32) -> Option<DraftRecord> {
        self.lock().get(&(actor, stage)).cloned()
    }

    pub fn clear(&self, actor: ActorType, stage: u32) {
        self.lock().remove(&(actor, stage));
    }

    /// Drop every draft belonging to `actor`.
    pub fn clear_all(&self, actor: ActorType) {
        self.lock().retain(|(a, _), _| *a != actor);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}
