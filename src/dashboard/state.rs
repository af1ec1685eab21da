//! The dashboard snapshot handed to the presentation layer.
//!
//! Every field of `stages` and `progress` is derived from `user_data` and
//! the stage registry by [`DashboardState::recompute`]; nothing derived is
//! ever written directly.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::stages::{
    ActorType, Progress, StageMap, StageRuntimeInfo, SyncStatus, definitions_for,
    is_stage_complete,
};
use crate::store::{RegistrationProfile, StageAck, StageData};

/// Top-level `user_data` keys carrying registration flags.
pub mod flag_keys {
    pub const IS_REGISTRATION_COMPLETE: &str = "isRegistrationComplete";
    pub const CURRENT_STEP: &str = "currentStep";
    pub const COMPLETED_STEPS: &str = "completedSteps";
    pub const STATUS: &str = "status";
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    #[default]
    Uninitialized,
    Loading,
    Ready,
    /// At least one explicit stage write is in flight.
    Saving,
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Uninitialized => "uninitialized",
            Self::Loading => "loading",
            Self::Ready => "ready",
            Self::Saving => "saving",
        };
        write!(f, "{s}")
    }
}

/// Live dashboard state for one actor's registration session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardState {
    pub actor_type: ActorType,
    pub phase: SessionPhase,
    pub current_stage: u32,
    pub total_stages: u32,
    pub stages: StageMap,
    pub user_data: Map<String, Value>,
    pub progress: Progress,
    pub loading: bool,
    pub auto_saving: bool,
    pub error: Option<String>,
}

/// `user_data` key for a stage's record.
pub fn stage_key(stage: u32) -> String {
    format!("stage{stage}")
}

impl DashboardState {
    /// Structurally complete fresh-start state: every stage incomplete,
    /// stage 1 current.
    pub fn fallback(actor: ActorType) -> Self {
        let mut state = Self {
            actor_type: actor,
            phase: SessionPhase::Uninitialized,
            current_stage: 1,
            total_stages: 0,
            stages: StageMap::new(),
            user_data: Map::new(),
            progress: Progress::default(),
            loading: false,
            auto_saving: false,
            error: None,
        };
        state.user_data.insert(
            flag_keys::IS_REGISTRATION_COMPLETE.to_string(),
            Value::Bool(false),
        );
        state
            .user_data
            .insert(flag_keys::CURRENT_STEP.to_string(), Value::from(1));
        state
            .user_data
            .insert(flag_keys::COMPLETED_STEPS.to_string(), Value::Array(Vec::new()));
        state.recompute();
        state
    }

    /// Ready state built from the service's aggregate record.
    ///
    /// The current stage is the server's `currentStep` when it names a real
    /// stage, otherwise the first incomplete stage, otherwise the last one.
    pub fn from_profile(actor: ActorType, profile: &RegistrationProfile) -> Self {
        let mut state = Self::fallback(actor);
        state.phase = SessionPhase::Ready;

        for (n, data) in &profile.stages {
            state.user_data.insert(stage_key(*n), Value::Object(data.clone()));
        }
        state.user_data.insert(
            flag_keys::IS_REGISTRATION_COMPLETE.to_string(),
            Value::Bool(profile.is_registration_complete),
        );
        state.user_data.insert(
            flag_keys::COMPLETED_STEPS.to_string(),
            Value::from(profile.completed_steps.clone()),
        );
        if let Some(step) = profile.current_step {
            state
                .user_data
                .insert(flag_keys::CURRENT_STEP.to_string(), Value::from(step));
        }
        if let Some(ref status) = profile.status {
            state
                .user_data
                .insert(flag_keys::STATUS.to_string(), Value::from(status.as_str()));
        }

        state.recompute();
        state.current_stage = match profile.current_step {
            Some(step) if state.stages.contains_key(&step) => step,
            _ => state
                .stages
                .iter()
                .find(|(_, info)| !info.completed)
                .map(|(n, _)| *n)
                .unwrap_or(state.total_stages.max(1)),
        };
        state.recompute();
        state
    }

    /// Rebuild `stages`, `total_stages` and `progress` from `user_data`.
    ///
    /// Sync status is carried over per stage.
    pub fn recompute(&mut self) {
        let declared = self.server_declared_steps();
        let all_declared = self.is_registration_complete();

        let stages: StageMap = definitions_for(self.actor_type)
            .iter()
            .map(|def| {
                let n = def.stage_number;
                let data = self.stage_data(n);
                let completed = all_declared
                    || declared.contains(&n)
                    || is_stage_complete(def.required_fields, data);
                let sync_status = self
                    .stages
                    .get(&n)
                    .map(|s| s.sync_status)
                    .unwrap_or_default();
                (
                    n,
                    StageRuntimeInfo {
                        completed,
                        is_current_stage: n == self.current_stage,
                        sync_status,
                    },
                )
            })
            .collect();

        self.total_stages = stages.len() as u32;
        self.stages = stages;
        self.progress = Progress::compute(&self.stages);
    }

    /// The stored record for a stage, if it is an object.
    pub fn stage_data(&self, stage: u32) -> Option<&StageData> {
        self.user_data.get(&stage_key(stage)).and_then(Value::as_object)
    }

    /// Shallow-merge `patch` into `user_data.stage{n}` and return the merged record.
    pub fn merge_stage_data(&mut self, stage: u32, patch: &StageData) -> StageData {
        let entry = self
            .user_data
            .entry(stage_key(stage))
            .or_insert_with(|| Value::Object(Map::new()));
        match entry {
            Value::Object(record) => {
                for (k, v) in patch {
                    record.insert(k.clone(), v.clone());
                }
                record.clone()
            }
            other => {
                *other = Value::Object(patch.clone());
                patch.clone()
            }
        }
    }

    /// Copy any registration flags the service confirmed into `user_data`.
    pub fn apply_ack(&mut self, ack: &StageAck) {
        if let Some(done) = ack.is_registration_complete {
            self.user_data.insert(
                flag_keys::IS_REGISTRATION_COMPLETE.to_string(),
                Value::Bool(done),
            );
        }
        if let Some(step) = ack.current_step {
            self.user_data
                .insert(flag_keys::CURRENT_STEP.to_string(), Value::from(step));
        }
        if let Some(ref steps) = ack.completed_steps {
            self.user_data.insert(
                flag_keys::COMPLETED_STEPS.to_string(),
                Value::from(steps.clone()),
            );
        }
        if let Some(ref status) = ack.status {
            self.user_data
                .insert(flag_keys::STATUS.to_string(), Value::from(status.as_str()));
        }
    }

    pub fn set_sync_status(&mut self, stage: u32, status: SyncStatus) {
        if let Some(info) = self.stages.get_mut(&stage) {
            info.sync_status = status;
        }
    }

    pub fn is_registration_complete(&self) -> bool {
        self.user_data
            .get(flag_keys::IS_REGISTRATION_COMPLETE)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    fn server_declared_steps(&self) -> Vec<u32> {
        self.user_data
            .get(flag_keys::COMPLETED_STEPS)
            .and_then(Value::as_array)
            .map(|steps| {
                steps
                    .iter()
                    .filter_map(|s| s.as_u64().and_then(|n| u32::try_from(n).ok()))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `stage` names one of this actor's stages.
    pub fn has_stage(&self, stage: u32) -> bool {
        self.stages.contains_key(&stage)
    }

    /// Whether any stage still holds data the service has not confirmed.
    pub fn has_unsynced_stages(&self) -> bool {
        self.stages
            .values()
            .any(|info| info.sync_status == SyncStatus::LocalOnly)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn data(v: Value) -> StageData {
        v.as_object().cloned().unwrap()
    }

    fn complete_stage_one() -> StageData {
        data(json!({
            "firstName": "Ada", "lastName": "Lovelace", "email": "ada@example.com",
            "phone": "555-0100", "dateOfBirth": "1990-01-01", "streetAddress": "1 Main St",
            "city": "Toronto", "province": "ON", "postalCode": "M5V 1A1"
        }))
    }

    #[test]
    fn fallback_is_structurally_complete() {
        let state = DashboardState::fallback(ActorType::Driver);
        assert_eq!(state.total_stages, 5);
        assert_eq!(state.stages.len(), 5);
        assert_eq!(state.current_stage, 1);
        assert!(state.stages[&1].is_current_stage);
        assert_eq!(state.progress.completed_stages, 0);
        assert_eq!(state.progress.percentage, 0);
        assert!(state.error.is_none());
        assert!(!state.is_registration_complete());
    }

    #[test]
    fn profile_field_data_marks_stage_complete() {
        let profile = RegistrationProfile {
            stages: [(1, complete_stage_one())].into_iter().collect(),
            ..Default::default()
        };
        let state = DashboardState::from_profile(ActorType::Driver, &profile);
        assert_eq!(state.phase, SessionPhase::Ready);
        assert!(state.stages[&1].completed);
        assert!(!state.stages[&2].completed);
        // First incomplete stage becomes current
        assert_eq!(state.current_stage, 2);
        assert_eq!(state.progress.percentage, 20);
    }

    #[test]
    fn server_declared_steps_count_without_field_data() {
        let profile = RegistrationProfile {
            current_step: Some(4),
            completed_steps: vec![1, 2, 3],
            ..Default::default()
        };
        let state = DashboardState::from_profile(ActorType::Driver, &profile);
        assert_eq!(state.progress.completed_stages, 3);
        assert_eq!(state.current_stage, 4);
        assert!(state.stages[&4].is_current_stage);
    }

    #[test]
    fn out_of_range_current_step_is_ignored() {
        let profile = RegistrationProfile {
            current_step: Some(42),
            ..Default::default()
        };
        let state = DashboardState::from_profile(ActorType::Restaurant, &profile);
        assert_eq!(state.current_stage, 1);
    }

    #[test]
    fn registration_complete_marks_everything() {
        let profile = RegistrationProfile {
            is_registration_complete: true,
            ..Default::default()
        };
        let state = DashboardState::from_profile(ActorType::Restaurant, &profile);
        assert_eq!(state.progress.percentage, 100);
        assert_eq!(state.current_stage, 6);
    }

    #[test]
    fn merge_is_shallow_and_keeps_existing_fields() {
        let mut state = DashboardState::fallback(ActorType::Driver);
        state.merge_stage_data(4, &data(json!({"sinNumber": "123"})));
        let merged = state.merge_stage_data(
            4,
            &data(json!({"bankingInfo": {"transitNumber": "1"}})),
        );
        assert_eq!(merged["sinNumber"], "123");
        assert_eq!(merged["bankingInfo"]["transitNumber"], "1");
    }

    #[test]
    fn merge_replaces_non_object_entry() {
        let mut state = DashboardState::fallback(ActorType::Driver);
        state.user_data.insert(stage_key(2), json!("garbage"));
        let merged = state.merge_stage_data(2, &data(json!({"vehicleType": "car"})));
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn recompute_keeps_sync_status() {
        let mut state = DashboardState::fallback(ActorType::Driver);
        state.set_sync_status(3, SyncStatus::LocalOnly);
        state.recompute();
        assert_eq!(state.stages[&3].sync_status, SyncStatus::LocalOnly);
        assert_eq!(state.stages[&2].sync_status, SyncStatus::Synced);
    }

    #[test]
    fn unsynced_stages_are_detected() {
        let mut state = DashboardState::fallback(ActorType::Restaurant);
        assert!(!state.has_unsynced_stages());
        state.set_sync_status(6, SyncStatus::LocalOnly);
        assert!(state.has_unsynced_stages());
        state.set_sync_status(6, SyncStatus::Synced);
        assert!(!state.has_unsynced_stages());
    }

    #[test]
    fn ack_flags_are_merged() {
        let mut state = DashboardState::fallback(ActorType::Driver);
        state.apply_ack(&StageAck {
            is_registration_complete: Some(true),
            status: Some("pending_review".to_string()),
            ..Default::default()
        });
        assert!(state.is_registration_complete());
        assert_eq!(state.user_data[flag_keys::STATUS], "pending_review");
        // Untouched flags keep their values
        assert_eq!(state.user_data[flag_keys::CURRENT_STEP], 1);
    }

    #[test]
    fn serializes_stage_keys_as_strings() {
        let state = DashboardState::fallback(ActorType::Driver);
        let json = serde_json::to_value(&state).unwrap();
        assert_eq!(json["stages"]["1"]["isCurrentStage"], true);
        assert_eq!(json["progress"]["totalStages"], 5);
        assert_eq!(json["phase"], "uninitialized");
        assert_eq!(json["actorType"], "driver");
    }
}
