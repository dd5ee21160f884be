//! Domain layer containing pure types and state machines.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (ids, probabilities, risk categories, errors)
//! - `cases` - Case summaries, prediction details and the ordered case collection
//! - `connection` - Push connection state machine and backoff policy

pub mod cases;
pub mod connection;
pub mod foundation;
