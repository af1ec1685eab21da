//! Debounced auto-save.
//!
//! One slot per `(actor, stage)`. Scheduling a save for a stage that already
//! has one pending aborts the pending timer and starts a fresh quiet period,
//! so only the newest payload in a burst of edits is ever written. Once the
//! timer fires the save leaves its slot and can no longer be cancelled.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RemoteError;
use crate::stages::ActorType;
use crate::store::{LocalDraftStore, RemoteStageStore, StageAck, StageData};

/// A payload waiting for its quiet period to elapse.
#[derive(Debug, Clone)]
pub struct SaveRequest {
    pub actor: ActorType,
    pub stage: u32,
    pub data: StageData,
    /// Opaque tag handed back to the observer, used by the controller to
    /// ignore saves that outlive the session that scheduled them.
    pub session: u64,
}

/// Hooks around a fired save.
#[async_trait]
pub trait AutoSaveObserver: Send + Sync {
    async fn save_started(&self, request: &SaveRequest);
    async fn save_finished(&self, request: &SaveRequest, result: &Result<StageAck, RemoteError>);
}

struct PendingSave {
    ticket: u64,
    handle: JoinHandle<()>,
}

type Slots = HashMap<(ActorType, u32), PendingSave>;

/// Single-slot-per-stage debouncer in front of the remote store.
pub struct AutoSaveScheduler {
    remote: Arc<dyn RemoteStageStore>,
    drafts: Arc<LocalDraftStore>,
    quiet_period: Duration,
    observer: Option<Arc<dyn AutoSaveObserver>>,
    slots: Arc<Mutex<Slots>>,
    next_ticket: AtomicU64,
}

fn lock(slots: &Mutex<Slots>) -> MutexGuard<'_, Slots> {
    slots.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl AutoSaveScheduler {
    pub fn new(
        remote: Arc<dyn RemoteStageStore>,
        drafts: Arc<LocalDraftStore>,
        quiet_period: Duration,
    ) -> Self {
        Self {
            remote,
            drafts,
            quiet_period,
            observer: None,
            slots: Arc::new(Mutex::new(HashMap::new())),
            next_ticket: AtomicU64::new(0),
        }
    }

    pub fn with_observer(mut self, observer: Arc<dyn AutoSaveObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Replace any pending save for the request's stage and restart the timer.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn schedule(&self, request: SaveRequest) {
        let key = (request.actor, request.stage);
        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);

        let slots = Arc::clone(&self.slots);
        let remote = Arc::clone(&self.remote);
        let drafts = Arc::clone(&self.drafts);
        let observer = self.observer.clone();
        let quiet_period = self.quiet_period;

        let mut guard = lock(&self.slots);
        if let Some(previous) = guard.remove(&key) {
            previous.handle.abort();
            debug!(actor = %request.actor, stage = request.stage, "Superseded pending auto-save");
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(quiet_period).await;

            // Leave the slot before writing; from here on the save is committed.
            {
                let mut slots = lock(&slots);
                match slots.get(&key) {
                    Some(pending) if pending.ticket == ticket => {
                        slots.remove(&key);
                    }
                    _ => return,
                }
            }

            flush(remote, drafts, observer, request).await;
        });

        guard.insert(key, PendingSave { ticket, handle });
    }

    /// Cancel the pending save for a stage. Returns whether one was pending.
    pub fn cancel(&self, actor: ActorType, stage: u32) -> bool {
        match lock(&self.slots).remove(&(actor, stage)) {
            Some(pending) => {
                pending.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending save for `actor`.
    pub fn cancel_all(&self, actor: ActorType) -> usize {
        let mut slots = lock(&self.slots);
        let keys: Vec<_> = slots.keys().filter(|(a, _)| *a == actor).copied().collect();
        for key in &keys {
            if let Some(pending) = slots.remove(key) {
                pending.handle.abort();
            }
        }
        keys.len()
    }

    pub fn is_pending(&self, actor: ActorType, stage: u32) -> bool {
        lock(&self.slots).contains_key(&(actor, stage))
    }

    pub fn pending_count(&self) -> usize {
        lock(&self.slots).len()
    }
}

impl Drop for AutoSaveScheduler {
    fn drop(&mut self) {
        for (_, pending) in lock(&self.slots).drain() {
            pending.handle.abort();
        }
    }
}

async fn flush(
    remote: Arc<dyn RemoteStageStore>,
    drafts: Arc<LocalDraftStore>,
    observer: Option<Arc<dyn AutoSaveObserver>>,
    request: SaveRequest,
) {
    drafts.save(request.actor, request.stage, &request.data);

    if let Some(ref observer) = observer {
        observer.save_started(&request).await;
    }

    let result = remote
        .persist_stage(request.actor, request.stage, &request.data)
        .await;
    match result {
        Ok(_) => debug!(actor = %request.actor, stage = request.stage, "Auto-saved stage"),
        Err(ref e) => warn!(
            actor = %request.actor,
            stage = request.stage,
            error = %e,
            "Auto-save failed; local draft kept"
        ),
    }

    if let Some(ref observer) = observer {
        observer.save_finished(&request, &result).await;
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use serde_json::json;
    use tokio::sync::Mutex as AsyncMutex;

    use super::*;
    use crate::store::RegistrationProfile;

    /// Records every persisted payload; optionally fails all writes.
    #[derive(Default)]
    struct RecordingStore {
        persisted: AsyncMutex<Vec<(u32, StageData)>>,
        fail: bool,
    }

    #[async_trait]
    impl RemoteStageStore for RecordingStore {
        async fn fetch_profile(&self, _actor: ActorType) -> Result<RegistrationProfile, RemoteError> {
            Ok(RegistrationProfile::default())
        }
        async fn fetch_stage(&self, _actor: ActorType, _stage: u32) -> Result<StageData, RemoteError> {
            Ok(StageData::new())
        }
        async fn persist_stage(
            &self,
            _actor: ActorType,
            stage: u32,
            data: &StageData,
        ) -> Result<StageAck, RemoteError> {
            if self.fail {
                return Err(RemoteError::Unavailable("offline".to_string()));
            }
            self.persisted.lock().await.push((stage, data.clone()));
            Ok(StageAck::default())
        }
    }

    #[derive(Default)]
    struct CountingObserver {
        started: AtomicUsize,
        failed: AtomicUsize,
    }

    #[async_trait]
    impl AutoSaveObserver for CountingObserver {
        async fn save_started(&self, _request: &SaveRequest) {
            self.started.fetch_add(1, Ordering::SeqCst);
        }
        async fn save_finished(&self, _request: &SaveRequest, result: &Result<StageAck, RemoteError>) {
            if result.is_err() {
                self.failed.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    fn request(stage: u32, value: &str) -> SaveRequest {
        SaveRequest {
            actor: ActorType::Driver,
            stage,
            data: json!({ "firstName": value }).as_object().cloned().unwrap(),
            session: 1,
        }
    }

    fn scheduler(store: Arc<RecordingStore>, drafts: Arc<LocalDraftStore>) -> AutoSaveScheduler {
        AutoSaveScheduler::new(store, drafts, Duration::from_secs(2))
    }

    #[tokio::test(start_paused = true)]
    async fn burst_of_edits_persists_once_with_last_payload() {
        let store = Arc::new(RecordingStore::default());
        let sched = scheduler(Arc::clone(&store), Arc::new(LocalDraftStore::new()));

        sched.schedule(request(1, "A"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        sched.schedule(request(1, "Ad"));
        tokio::time::sleep(Duration::from_millis(500)).await;
        sched.schedule(request(1, "Ada"));
        assert!(sched.is_pending(ActorType::Driver, 1));

        tokio::time::sleep(Duration::from_secs(3)).await;

        let persisted = store.persisted.lock().await;
        assert_eq!(persisted.len(), 1);
        assert_eq!(persisted[0].1["firstName"], "Ada");
        assert!(!sched.is_pending(ActorType::Driver, 1));
    }

    #[tokio::test(start_paused = true)]
    async fn nothing_is_written_before_the_quiet_period() {
        let store = Arc::new(RecordingStore::default());
        let sched = scheduler(Arc::clone(&store), Arc::new(LocalDraftStore::new()));

        sched.schedule(request(2, "x"));
        tokio::time::sleep(Duration::from_millis(1900)).await;
        assert!(store.persisted.lock().await.is_empty());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(store.persisted.lock().await.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stages_debounce_independently() {
        let store = Arc::new(RecordingStore::default());
        let sched = scheduler(Arc::clone(&store), Arc::new(LocalDraftStore::new()));

        sched.schedule(request(1, "one"));
        sched.schedule(request(2, "two"));
        assert_eq!(sched.pending_count(), 2);

        tokio::time::sleep(Duration::from_secs(3)).await;

        let mut stages: Vec<u32> = store.persisted.lock().await.iter().map(|(s, _)| *s).collect();
        stages.sort();
        assert_eq!(stages, vec![1, 2]);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_save() {
        let store = Arc::new(RecordingStore::default());
        let sched = scheduler(Arc::clone(&store), Arc::new(LocalDraftStore::new()));

        sched.schedule(request(3, "x"));
        sched.schedule(request(4, "y"));
        assert!(sched.cancel(ActorType::Driver, 3));
        assert!(!sched.cancel(ActorType::Driver, 3));
        assert_eq!(sched.cancel_all(ActorType::Driver), 1);

        tokio::time::sleep(Duration::from_secs(3)).await;
        assert!(store.persisted.lock().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failure_is_swallowed_and_draft_kept() {
        let store = Arc::new(RecordingStore {
            fail: true,
            ..Default::default()
        });
        let drafts = Arc::new(LocalDraftStore::new());
        let observer = Arc::new(CountingObserver::default());
        let sched = scheduler(store, Arc::clone(&drafts)).with_observer(observer.clone());

        sched.schedule(request(1, "offline"));
        tokio::time::sleep(Duration::from_secs(3)).await;

        assert_eq!(observer.started.load(Ordering::SeqCst), 1);
        assert_eq!(observer.failed.load(Ordering::SeqCst), 1);
        let draft = drafts.load(ActorType::Driver, 1).unwrap();
        assert_eq!(draft["firstName"], "offline");
    }
}
