//! Stage topology and the pure functions derived from it.
//!
//! Each actor type walks a fixed, linear sequence of stages. A stage is
//! complete when every one of its field rules holds against the latest
//! known stage data; progress is the aggregate over all stages.

pub mod completion;
pub mod progress;
pub mod registry;

pub use completion::is_stage_complete;
pub use progress::{Progress, StageMap, StageRuntimeInfo, SyncStatus};
pub use registry::{ActorType, FieldRule, StageDefinition, definition, definitions_for};
