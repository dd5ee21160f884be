//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, enums, and error types
//! that form the vocabulary of the case synchronization domain.

mod errors;
mod ids;
mod probability;
mod risk_category;
mod state_machine;

pub use errors::ValidationError;
pub use ids::{CaseId, PatientId, SubscriptionId};
pub use probability::Probability;
pub use risk_category::RiskCategory;
pub use state_machine::StateMachine;
