//! Case summary value object used by list views.

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CaseId, PatientId, Probability, RiskCategory};

/// Compact, list-view representation of a case.
///
/// Summaries are immutable values: an update replaces the whole record for
/// its `case_id`, fields are never patched individually.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseSummary {
    pub case_id: CaseId,
    pub patient_id: PatientId,
    pub display_name: String,
    pub risk_category: RiskCategory,
    pub stroke_probability: Probability,
    pub lvo_probability: Probability,
    #[serde(default)]
    pub minutes_since_onset: Option<i64>,
    pub is_active: bool,
}

impl CaseSummary {
    /// Identity of this summary within a collection.
    pub fn id(&self) -> &CaseId {
        &self.case_id
    }
}
