//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the synchronization core and the outside world. Adapters implement these
//! ports.
//!
//! - `CaseApi` - Pull side: case list, case detail, health, streaming metrics
//! - `PushTransport` - Push side: opens the persistent update channel

mod case_api;
mod push_transport;

pub use case_api::{CaseApi, CaseApiError, CircuitBreakerState, HealthReport, StreamingMetrics};
pub use push_transport::{FrameSink, InboundFrame, PushChannel, PushTransport, PushTransportError};
