//! Application layer - the synchronization components and their wiring.
//!
//! - `connection_manager` - Push channel lifecycle and reconnection
//! - `dispatcher` - Routes push messages to the store and registry
//! - `store` - Shared, observable case collection
//! - `registry` - Per-case fan-out of pushed prediction details
//! - `refresh_scheduler` - Periodic full-collection refresh
//! - `detail_view` - Live detail for one case (push + poll)
//! - `session` - Owns and wires everything above

mod connection_manager;
mod detail_view;
mod diagnostics;
mod dispatcher;
mod polling;
mod refresh_scheduler;
mod registry;
mod session;
mod status;
mod store;

pub use connection_manager::{ConnectionManager, ConnectionSettings};
pub use detail_view::CaseDetailView;
pub use diagnostics::{DiagnosticsSnapshot, SyncDiagnostics};
pub use dispatcher::{DispatchOutcome, Dispatcher};
pub use polling::{spawn_poll, CancellationFlag, RefreshHandle};
pub use refresh_scheduler::{RefreshOutcome, RefreshScheduler};
pub use registry::{DetailCallback, DetailUpdateRegistry, Subscription};
pub use session::{SessionSettings, SyncSession};
pub use status::{AlertKind, RefreshStatus, StatusBoard, SyncAlert};
pub use store::CaseStore;
