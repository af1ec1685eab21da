//! Stage progression and state synchronization for
//! driver and restaurant registration.

pub mod config;
pub mod dashboard;
pub mod error;
pub mod stages;
pub mod store;
