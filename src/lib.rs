//! NeuroPulse Sync - real-time case synchronization for the triage dashboard
//!
//! Keeps a client-side view of triage cases consistent with the prediction
//! server by combining a WebSocket push channel with periodic REST polling.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;

pub use application::{CaseDetailView, CaseStore, SessionSettings, SyncSession};
pub use config::AppConfig;
