//! The remote registration service and the session draft cache.

pub mod drafts;
pub mod remote;

pub use drafts::{DraftRecord, LocalDraftStore};
pub use remote::{HttpStageStore, RegistrationProfile, RemoteStageStore, StageAck, StageData};
