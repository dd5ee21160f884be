//! NeuroPulse Sync client
//!
//! Connects to the prediction server, keeps the case collection in sync and
//! logs every change until interrupted.
//!
//! # Environment Variables
//! - `NEURO_PULSE__PUSH__URL`: WebSocket endpoint (default: "ws://localhost:8000/ws")
//! - `NEURO_PULSE__API__BASE_URL`: REST base URL (default: "http://localhost:8000")
//! - `NEURO_PULSE__TELEMETRY__LOG_LEVEL`: log filter, overridden by `RUST_LOG`
//! - `NEURO_PULSE__TELEMETRY__JSON_LOGS`: emit JSON log lines

use std::error::Error;
use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use neuro_pulse_sync::adapters::{HttpCaseApi, HttpCaseApiConfig, TungsteniteTransport};
use neuro_pulse_sync::config::{AppConfig, TelemetryConfig};
use neuro_pulse_sync::SyncSession;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let config = AppConfig::load()?;
    config.validate()?;

    init_tracing(&config.telemetry);

    tracing::info!(
        push_url = %config.push.url,
        api_url = %config.api.base_url,
        environment = ?config.telemetry.environment,
        "starting neuro-pulse sync client"
    );

    let api = HttpCaseApi::new(
        HttpCaseApiConfig::new(config.api.base_url.clone()).with_timeout(config.api.timeout()),
    )?;

    let session = SyncSession::start(
        config.session_settings(),
        Arc::new(api),
        Arc::new(TungsteniteTransport::new()),
    );

    let mut revisions = session.store().watch();
    let mut connection = session.connection().watch_status();
    let mut status = session.status().watch();

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                tracing::info!("interrupt received, shutting down");
                break;
            }
            changed = revisions.changed() => {
                if changed.is_err() {
                    break;
                }
                let revision = *revisions.borrow_and_update();
                let store = session.store();
                tracing::info!(
                    revision,
                    cases = store.len(),
                    selected = ?store.selected(),
                    "case collection updated"
                );
            }
            changed = connection.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = connection.borrow_and_update().clone();
                tracing::info!(
                    state = %snapshot.state,
                    attempts = snapshot.attempts,
                    reconnect_scheduled = snapshot.reconnect_scheduled,
                    "push connection status changed"
                );
                if let Some(advisory) = snapshot.advisory() {
                    tracing::warn!("{}", advisory);
                }
            }
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = status.borrow_and_update().clone();
                match current.alert {
                    Some(alert) => tracing::warn!(kind = ?alert.kind, "{}", alert.message),
                    None => tracing::debug!(last_synced_at = ?current.last_synced_at, "refresh ok"),
                }
            }
        }
    }

    session.shutdown();
    tracing::info!(diagnostics = ?session.diagnostics(), "sync client stopped");

    Ok(())
}

fn init_tracing(telemetry: &TelemetryConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&telemetry.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    if telemetry.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
