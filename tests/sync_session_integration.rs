//! Integration tests for a full synchronization session.
//!
//! These tests drive a `SyncSession` end to end through the in-memory ports:
//! 1. The push peer delivers `initial_state` / `case_updated` frames
//! 2. The dispatcher applies them to the store and fans details out
//! 3. The refresh scheduler polls the case API alongside the push channel
//! 4. Connection loss triggers bounded reconnection with backoff
//!
//! All timing runs on Tokio's paused clock.

use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use neuro_pulse_sync::adapters::{InMemoryCaseApi, InMemoryPushTransport};
use neuro_pulse_sync::application::{AlertKind, ConnectionSettings, SessionSettings, SyncSession};
use neuro_pulse_sync::domain::cases::CaseSummary;
use neuro_pulse_sync::domain::connection::ConnectionState;
use neuro_pulse_sync::domain::foundation::{CaseId, RiskCategory};
use neuro_pulse_sync::ports::CaseApiError;

// =============================================================================
// Test Infrastructure
// =============================================================================

fn settings(push_enabled: bool) -> SessionSettings {
    SessionSettings {
        connection: ConnectionSettings {
            url: "ws://triage.test/ws".to_string(),
            enabled: push_enabled,
            ..ConnectionSettings::default()
        },
        ..SessionSettings::default()
    }
}

fn summary_json(case_id: &str, risk: &str) -> Value {
    json!({
        "caseId": case_id,
        "patientId": format!("PT-{}", case_id),
        "displayName": format!("Patient {}", case_id),
        "riskCategory": risk,
        "strokeProbability": 0.62,
        "lvoProbability": 0.31,
        "minutesSinceOnset": 45,
        "isActive": true
    })
}

fn summary(case_id: &str, risk: &str) -> CaseSummary {
    serde_json::from_value(summary_json(case_id, risk)).expect("valid summary")
}

fn detail_json(case_id: &str, prediction_id: &str) -> Value {
    json!({
        "predictionId": prediction_id,
        "caseId": case_id,
        "patientId": format!("PT-{}", case_id),
        "predictionTs": "2024-05-01T10:15:00Z",
        "strokeProbability": 0.91,
        "lvoProbability": 0.72,
        "riskCategory": "CRITICAL",
        "recommendedDestinationType": "COMPREHENSIVE_CENTER",
        "estimatedTravelMinToRecommended": 18,
        "topRiskFactors": ["NIHSS 16", "Atrial fibrillation"]
    })
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

fn ids(session: &SyncSession) -> Vec<String> {
    session
        .store()
        .cases()
        .iter()
        .map(|c| c.case_id.as_str().to_string())
        .collect()
}

// =============================================================================
// Collection Scenarios
// =============================================================================

#[tokio::test(start_paused = true)]
async fn polling_alone_populates_collection_when_push_disabled() {
    let api = Arc::new(InMemoryCaseApi::with_cases(vec![summary("c1", "HIGH")]));
    let transport = Arc::new(InMemoryPushTransport::new());

    let session = SyncSession::start(settings(false), api.clone(), transport.clone());
    settle().await;

    assert_eq!(ids(&session), vec!["c1"]);
    assert_eq!(session.store().selected(), Some(CaseId::new("c1")));
    assert_eq!(transport.connect_count(), 0);
    assert!(!session.connection_status().push_enabled);

    // The next refresh picks up server-side changes.
    api.set_cases(vec![summary("c2", "LOW"), summary("c1", "HIGH")]);
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(ids(&session), vec!["c2", "c1"]);
    assert_eq!(session.store().selected(), Some(CaseId::new("c1")));
    assert_eq!(api.list_calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn update_after_initial_state_keeps_order() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport);
    settle().await;

    peer.send_json(&json!({
        "type": "initial_state",
        "cases": [summary_json("a", "HIGH"), summary_json("b", "MODERATE")]
    }));
    peer.send_json(&json!({
        "type": "case_updated",
        "case": summary_json("b", "CRITICAL")
    }));
    settle().await;

    assert_eq!(ids(&session), vec!["a", "b"]);
    let updated = session.store().get(&CaseId::new("b")).expect("b present");
    assert_eq!(updated.risk_category, RiskCategory::Critical);
    assert_eq!(session.store().selected(), Some(CaseId::new("a")));
}

#[tokio::test(start_paused = true)]
async fn new_cases_arrive_at_the_front() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport);
    settle().await;

    peer.send_json(&json!({ "type": "initial_state", "cases": [] }));
    peer.send_json(&json!({ "type": "case_updated", "case": summary_json("x", "LOW") }));
    peer.send_json(&json!({ "type": "case_updated", "case": summary_json("y", "HIGH") }));
    peer.send_json(&json!({ "type": "case_updated", "case": summary_json("x", "MODERATE") }));
    settle().await;

    assert_eq!(ids(&session), vec!["y", "x"]);
    assert_eq!(session.store().selected(), Some(CaseId::new("x")));
}

#[tokio::test(start_paused = true)]
async fn emptied_collection_selects_next_arriving_case() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport);
    settle().await;

    peer.send_json(&json!({
        "type": "initial_state",
        "cases": [summary_json("a", "HIGH"), summary_json("b", "LOW")]
    }));
    settle().await;
    assert_eq!(session.store().selected(), Some(CaseId::new("a")));

    peer.send_json(&json!({ "type": "initial_state", "cases": [] }));
    settle().await;
    assert_eq!(session.store().selected(), None);

    peer.send_json(&json!({ "type": "case_updated", "case": summary_json("x", "CRITICAL") }));
    settle().await;

    assert_eq!(ids(&session), vec!["x"]);
    assert_eq!(session.store().selected(), Some(CaseId::new("x")));
}

// =============================================================================
// Detail Fan-out
// =============================================================================

#[tokio::test(start_paused = true)]
async fn pushed_detail_reaches_every_open_view() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport);
    settle().await;

    let first = session.open_detail(CaseId::new("c7"));
    let second = session.open_detail(CaseId::new("c7"));
    let other = session.open_detail(CaseId::new("c8"));
    settle().await;
    assert_eq!(session.registry().subscriber_count(&CaseId::new("c7")), 2);

    peer.send_json(&json!({
        "type": "case_updated",
        "case": summary_json("c7", "CRITICAL"),
        "detail": detail_json("c7", "pred-1")
    }));
    settle().await;

    let a = first.latest().expect("first view updated");
    let b = second.latest().expect("second view updated");
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(a.prediction_id, "pred-1");
    assert!(other.latest().is_none());
}

#[tokio::test(start_paused = true)]
async fn summary_only_update_leaves_views_untouched() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport);
    settle().await;
    let view = session.open_detail(CaseId::new("c7"));
    settle().await;

    peer.send_json(&json!({
        "type": "case_updated",
        "case": summary_json("c7", "HIGH")
    }));
    settle().await;

    assert!(view.latest().is_none());
    assert!(session.store().get(&CaseId::new("c7")).is_some());
}

#[tokio::test(start_paused = true)]
async fn closing_view_stops_polling_and_unsubscribes() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api.clone(), transport);
    settle().await;

    let view = session.open_detail(CaseId::new("c7"));
    settle().await;
    assert_eq!(api.detail_calls(), 1);

    view.close();
    assert!(!session.registry().has_subscribers(&CaseId::new("c7")));

    peer.send_json(&json!({
        "type": "case_updated",
        "case": summary_json("c7", "HIGH"),
        "detail": detail_json("c7", "pred-2")
    }));
    tokio::time::sleep(Duration::from_secs(20)).await;

    assert!(view.latest().is_none());
    assert_eq!(api.detail_calls(), 1);
}

// =============================================================================
// Failure Handling
// =============================================================================

#[tokio::test(start_paused = true)]
async fn bad_frames_are_counted_not_surfaced() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport);
    settle().await;

    peer.send_text("{not json");
    peer.send_json(&json!({ "type": "case_deleted", "caseId": "c1" }));
    peer.send_json(&json!({
        "type": "case_updated",
        "case": summary_json("c1", "LOW"),
        "detail": { "caseId": "c1" }
    }));
    settle().await;

    let diagnostics = session.diagnostics();
    assert_eq!(diagnostics.frames_received, 3);
    assert_eq!(diagnostics.malformed_messages, 1);
    assert_eq!(diagnostics.unknown_messages, 1);
    assert_eq!(diagnostics.detail_decode_failures, 1);

    // The summary in the last frame is still applied.
    assert_eq!(ids(&session), vec!["c1"]);
    assert_eq!(session.connection_status().state, ConnectionState::Open);
    assert!(session.status().alert().is_none());
}

#[tokio::test(start_paused = true)]
async fn failed_refresh_keeps_collection_and_raises_alert() {
    let api = Arc::new(InMemoryCaseApi::with_cases(vec![summary("c1", "HIGH")]));
    let transport = Arc::new(InMemoryPushTransport::new());

    let session = SyncSession::start(settings(false), api.clone(), transport);
    settle().await;
    assert_eq!(ids(&session), vec!["c1"]);

    api.fail_next(CaseApiError::Timeout { timeout_secs: 10 });
    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(ids(&session), vec!["c1"]);
    let alert = session.status().alert().expect("alert raised");
    assert_eq!(alert.kind, AlertKind::ServerNotResponding);
    assert_eq!(session.status().current().consecutive_failures, 1);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(session.status().alert().is_none());
    assert!(session.status().current().last_synced_at.is_some());
}

#[tokio::test(start_paused = true)]
async fn unclean_drop_reconnects_and_resyncs() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let first = transport.accept_next();
    let second = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport.clone());
    settle().await;
    first.send_json(&json!({ "type": "initial_state", "cases": [summary_json("a", "LOW")] }));
    settle().await;

    first.drop_connection();
    settle().await;
    let status = session.connection_status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(status.reconnect_scheduled);

    tokio::time::sleep(Duration::from_millis(1000)).await;
    assert_eq!(transport.connect_count(), 2);
    assert_eq!(session.connection_status().state, ConnectionState::Open);
    assert_eq!(session.connection_status().attempts, 0);

    second.send_json(&json!({
        "type": "initial_state",
        "cases": [summary_json("b", "HIGH"), summary_json("a", "LOW")]
    }));
    settle().await;
    assert_eq!(ids(&session), vec!["b", "a"]);
}

#[tokio::test(start_paused = true)]
async fn clean_server_close_does_not_reconnect() {
    let api = Arc::new(InMemoryCaseApi::new());
    let transport = Arc::new(InMemoryPushTransport::new());
    let peer = transport.accept_next();

    let session = SyncSession::start(settings(true), api, transport.clone());
    settle().await;

    peer.close(true);
    tokio::time::sleep(Duration::from_secs(60)).await;

    let status = session.connection_status();
    assert_eq!(status.state, ConnectionState::Disconnected);
    assert!(!status.reconnect_scheduled);
    assert_eq!(transport.connect_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn exhausted_reconnection_falls_back_to_polling() {
    let api = Arc::new(InMemoryCaseApi::with_cases(vec![summary("c1", "HIGH")]));
    let transport = Arc::new(InMemoryPushTransport::new());

    let session = SyncSession::start(settings(true), api.clone(), transport.clone());
    tokio::time::sleep(Duration::from_secs(80)).await;

    let status = session.connection_status();
    assert!(status.live_updates_unavailable);
    assert!(status.advisory().is_some());
    assert_eq!(transport.connect_count(), 11);

    // Polling continues to keep the collection current.
    api.set_cases(vec![summary("c2", "LOW"), summary("c1", "HIGH")]);
    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(ids(&session), vec!["c2", "c1"]);
    assert_eq!(transport.connect_count(), 11);

    // An explicit reconnect starts over.
    let _peer = transport.accept_next();
    session.reconnect();
    settle().await;
    let status = session.connection_status();
    assert_eq!(status.state, ConnectionState::Open);
    assert!(!status.live_updates_unavailable);
}
