//! Controller that owns the dashboard state and every mutation
//! of it.
//!
//! Lifecycle: `Uninitialized → Loading → Ready ⇄ Saving`. No public
//! operation returns an error; remote failures degrade into a valid state
//! (fresh-start fallback, local draft, `localOnly` sync status) and are
//! logged.
//!
//! Each `initialize` and `teardown` starts a new session epoch. Work that
//! finishes after its epoch has ended (a superseded profile fetch, a stage
//! write that outlives a teardown, a late auto-save) is dropped instead of
//! being applied to the newer state.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use super::autosave::{AutoSaveObserver, AutoSaveScheduler, SaveRequest};
use super::state::{DashboardState, SessionPhase};
use crate::config::SessionConfig;
use crate::error::{self, RemoteError};
use crate::stages::{ActorType, SyncStatus};
use crate::store::{HttpStageStore, LocalDraftStore, RemoteStageStore, StageAck, StageData};

/// State plus the bookkeeping that must change atomically with it.
struct Session {
    state: DashboardState,
    epoch: u64,
    pending_writes: u32,
    pending_autosaves: u32,
}

impl Session {
    fn reset(&mut self, state: DashboardState) {
        self.epoch += 1;
        self.pending_writes = 0;
        self.pending_autosaves = 0;
        self.state = state;
    }
}

/// Coordinates the stage registry, both stores, and the auto-save scheduler
/// behind a narrow set of operations for the presentation layer.
pub struct DashboardStateController {
    remote: Arc<dyn RemoteStageStore>,
    drafts: Arc<LocalDraftStore>,
    autosave: AutoSaveScheduler,
    session: Arc<RwLock<Session>>,
    init_timeout: Duration,
}

impl DashboardStateController {
    /// Create a controller seeded with the fresh-start state for `actor`.
    pub fn new(
        actor: ActorType,
        remote: Arc<dyn RemoteStageStore>,
        drafts: Arc<LocalDraftStore>,
        config: &SessionConfig,
    ) -> Self {
        let session = Arc::new(RwLock::new(Session {
            state: DashboardState::fallback(actor),
            epoch: 0,
            pending_writes: 0,
            pending_autosaves: 0,
        }));
        let observer = Arc::new(SessionObserver {
            session: Arc::clone(&session),
        });
        let autosave = AutoSaveScheduler::new(
            Arc::clone(&remote),
            Arc::clone(&drafts),
            config.autosave_quiet_period,
        )
        .with_observer(observer);

        Self {
            remote,
            drafts,
            autosave,
            session,
            init_timeout: config.init_timeout,
        }
    }

    /// Build a controller backed by the HTTP registration service.
    pub fn connect(actor: ActorType, config: &SessionConfig) -> error::Result<Self> {
        let remote: Arc<dyn RemoteStageStore> = Arc::new(HttpStageStore::new(config)?);
        let drafts = Arc::new(LocalDraftStore::new());
        Ok(Self::new(actor, remote, drafts, config))
    }

    /// Load the actor's registration record and rebuild the dashboard.
    ///
    /// Falls back to the fresh-start state, without setting `error`, if the
    /// fetch fails or does not finish within the init timeout. The timed-out
    /// fetch is dropped, so it can never write to the state afterwards.
    pub async fn initialize(&self, actor: ActorType) -> DashboardState {
        let epoch = {
            let mut session = self.session.write().await;
            let mut loading = DashboardState::fallback(actor);
            loading.phase = SessionPhase::Loading;
            loading.loading = true;
            session.reset(loading);
            session.epoch
        };

        info!(actor = %actor, "Initializing registration dashboard");

        let next = match tokio::time::timeout(self.init_timeout, self.remote.fetch_profile(actor))
            .await
        {
            Ok(Ok(profile)) => DashboardState::from_profile(actor, &profile),
            Ok(Err(e)) => {
                warn!(actor = %actor, error = %e, "Profile fetch failed; starting from a fresh dashboard");
                ready_fallback(actor)
            }
            Err(_) => {
                warn!(
                    actor = %actor,
                    timeout = ?self.init_timeout,
                    "Profile fetch timed out; starting from a fresh dashboard"
                );
                ready_fallback(actor)
            }
        };

        let mut session = self.session.write().await;
        if session.epoch != epoch {
            debug!(actor = %actor, "Discarding superseded initialization");
            return session.state.clone();
        }
        session.state = next;
        info!(
            actor = %actor,
            completed = session.state.progress.completed_stages,
            total = session.state.progress.total_stages,
            current = session.state.current_stage,
            "Dashboard ready"
        );
        session.state.clone()
    }

    /// Make `stage` the current stage.
    ///
    /// Reachability is not checked; a stage number the actor does not have is
    /// ignored.
    pub async fn navigate_to_stage(&self, stage: u32) -> DashboardState {
        let mut session = self.session.write().await;
        if !session.state.has_stage(stage) {
            warn!(
                actor = %session.state.actor_type,
                stage,
                "Ignoring navigation to unknown stage"
            );
            return session.state.clone();
        }
        session.state.current_stage = stage;
        session.state.recompute();
        session.state.clone()
    }

    /// Move to the next stage, if there is one.
    pub async fn advance(&self) -> DashboardState {
        let next = self.session.read().await.state.current_stage + 1;
        self.step_to(next).await
    }

    /// Move to the previous stage, if there is one.
    pub async fn go_back(&self) -> DashboardState {
        let current = self.session.read().await.state.current_stage;
        match current.checked_sub(1) {
            Some(previous) => self.step_to(previous).await,
            None => self.snapshot().await,
        }
    }

    async fn step_to(&self, stage: u32) -> DashboardState {
        let mut session = self.session.write().await;
        if session.state.has_stage(stage) {
            session.state.current_stage = stage;
            session.state.recompute();
        }
        session.state.clone()
    }

    /// Merge `patch` into the stage's data and try to persist it.
    ///
    /// The merge and the completion/progress recomputation happen before the
    /// write and are never rolled back. Returns the stage's resulting sync
    /// status, or `None` if the actor has no such stage.
    pub async fn update_stage_data(&self, stage: u32, patch: StageData) -> Option<SyncStatus> {
        let (epoch, actor, merged) = {
            let mut session = self.session.write().await;
            if !session.state.has_stage(stage) {
                warn!(actor = %session.state.actor_type, stage, "Ignoring update for unknown stage");
                return None;
            }
            let merged = session.state.merge_stage_data(stage, &patch);
            session.state.recompute();
            session.pending_writes += 1;
            if matches!(session.state.phase, SessionPhase::Ready) {
                session.state.phase = SessionPhase::Saving;
            }
            (session.epoch, session.state.actor_type, merged)
        };

        self.drafts.save(actor, stage, &merged);
        let result = self.remote.persist_stage(actor, stage, &merged).await;

        let status = match result {
            Ok(_) => SyncStatus::Synced,
            Err(_) => SyncStatus::LocalOnly,
        };

        let mut session = self.session.write().await;
        if session.epoch != epoch {
            debug!(actor = %actor, stage, "Session ended before stage write finished");
            return Some(status);
        }

        session.pending_writes = session.pending_writes.saturating_sub(1);
        if session.pending_writes == 0 && session.state.phase == SessionPhase::Saving {
            session.state.phase = SessionPhase::Ready;
        }

        match result {
            Ok(ack) => {
                debug!(actor = %actor, stage, "Stage saved");
                session.state.apply_ack(&ack);
                session.state.recompute();
                session.state.set_sync_status(stage, SyncStatus::Synced);
                if !session.state.has_unsynced_stages() {
                    session.state.error = None;
                }
            }
            Err(e) => {
                warn!(actor = %actor, stage, error = %e, "Stage saved locally only");
                session.state.set_sync_status(stage, SyncStatus::LocalOnly);
                session.state.error = Some(format!(
                    "Stage {stage} is saved on this device but could not be synced yet"
                ));
            }
        }

        Some(status)
    }

    /// Merge `patch` into the stage's data and debounce a write of the
    /// merged record; see [`AutoSaveScheduler`].
    ///
    /// Returns `false` if the actor has no such stage.
    pub async fn auto_save(&self, stage: u32, patch: StageData) -> bool {
        let request = {
            let mut session = self.session.write().await;
            if !session.state.has_stage(stage) {
                warn!(actor = %session.state.actor_type, stage, "Ignoring auto-save for unknown stage");
                return false;
            }
            let merged = session.state.merge_stage_data(stage, &patch);
            session.state.recompute();
            SaveRequest {
                actor: session.state.actor_type,
                stage,
                data: merged,
                session: session.epoch,
            }
        };
        self.autosave.schedule(request);
        true
    }

    /// Read-through fetch of a stage's data: remote, then local draft, then
    /// an empty record.
    pub async fn get_stage_data(&self, stage: u32) -> StageData {
        let actor = self.session.read().await.state.actor_type;
        match self.remote.fetch_stage(actor, stage).await {
            Ok(data) => data,
            Err(e) => match self.drafts.load(actor, stage) {
                Some(draft) => {
                    warn!(actor = %actor, stage, error = %e, "Stage fetch failed; using local draft");
                    draft
                }
                None => {
                    warn!(actor = %actor, stage, error = %e, "Stage fetch failed and no local draft exists");
                    StageData::new()
                }
            },
        }
    }

    /// End the session: cancel pending auto-saves, drop the actor's drafts,
    /// and return to the uninitialized fresh-start state.
    pub async fn teardown(&self) {
        let mut session = self.session.write().await;
        let actor = session.state.actor_type;
        let cancelled = self.autosave.cancel_all(actor);
        self.drafts.clear_all(actor);
        session.reset(DashboardState::fallback(actor));
        info!(actor = %actor, cancelled_autosaves = cancelled, "Registration session torn down");
    }

    /// A copy of the current state.
    pub async fn snapshot(&self) -> DashboardState {
        self.session.read().await.state.clone()
    }

}

fn ready_fallback(actor: ActorType) -> DashboardState {
    let mut state = DashboardState::fallback(actor);
    state.phase = SessionPhase::Ready;
    state
}

/// Keeps `auto_saving` and per-stage sync status in step with fired saves.
struct SessionObserver {
    session: Arc<RwLock<Session>>,
}

#[async_trait]
impl AutoSaveObserver for SessionObserver {
    async fn save_started(&self, request: &SaveRequest) {
        let mut session = self.session.write().await;
        if session.epoch != request.session {
            return;
        }
        session.pending_autosaves += 1;
        session.state.auto_saving = true;
    }

    async fn save_finished(&self, request: &SaveRequest, result: &Result<StageAck, RemoteError>) {
        let mut session = self.session.write().await;
        if session.epoch != request.session {
            return;
        }
        session.pending_autosaves = session.pending_autosaves.saturating_sub(1);
        session.state.auto_saving = session.pending_autosaves > 0;

        match result {
            Ok(ack) => {
                if !ack.is_empty() {
                    session.state.apply_ack(ack);
                    session.state.recompute();
                }
                session.state.set_sync_status(request.stage, SyncStatus::Synced);
            }
            Err(_) => session.state.set_sync_status(request.stage, SyncStatus::LocalOnly),
        }
    }
}
