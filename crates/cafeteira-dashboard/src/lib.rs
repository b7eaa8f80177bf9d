//! # cafeteira-dashboard
//!
//! Presentation layer of the Cafeteira console:
//!
//! - [`alerts`]: stacked, auto-dismissing alerts
//! - [`snapshot`]: cached stats, users and logs
//! - [`render`]: pure view models built from the snapshot
//! - [`refresh`]: full refreshes, polling and realtime push handling
//! - [`actions`]: admin commands with alert feedback
//! - [`state`]: the application state object and its teardown path
//! - [`console`]: live terminal front-end

pub mod actions;
pub mod alerts;
pub mod console;
pub mod refresh;
pub mod render;
pub mod snapshot;
pub mod state;

pub use actions::AdminActions;
pub use alerts::{Alert, AlertEvent, AlertSink, Severity};
pub use refresh::{Panel, RefreshCoordinator, Route, ViewEvent, ViewKind};
pub use snapshot::{DashboardSnapshot, LogBuffer};
pub use state::AppState;
