//! The registration dashboard: the state container the presentation layer reads
//! from, plus the machinery that keeps it in sync with the registration
//! service.
//!
//! Data flows one way: the client calls an operation on
//! [`DashboardStateController`], the controller mutates its private
//! [`DashboardState`], and the client re-renders from a fresh snapshot.

pub mod autosave;
pub mod controller;
pub mod routes;
pub mod state;

pub use autosave::{AutoSaveObserver, AutoSaveScheduler, SaveRequest};
pub use controller::DashboardStateController;
pub use routes::{DashboardRouteState, dashboard_routes};
pub use state::{DashboardState, SessionPhase};
