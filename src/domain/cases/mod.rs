//! Case records delivered by the prediction pipeline.
//!
//! - `CaseSummary` - compact list-view record
//! - `PredictionDetail` - full per-case record for the detail view
//! - `CaseCollection` - ordered, unique-by-id collection with a selection

mod collection;
mod detail;
mod summary;

pub use collection::{CaseCollection, UpsertOutcome};
pub use detail::{DestinationType, PredictionDetail, RoutingRecommendation, VitalSigns};
pub use summary::CaseSummary;
