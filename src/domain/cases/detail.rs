//! Prediction detail - the full per-case record shown in the detail view.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::CaseSummary;
use crate::domain::foundation::{CaseId, PatientId, Probability, RiskCategory};

/// Kind of stroke center a patient is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DestinationType {
    /// Can administer IV thrombolysis.
    PrimaryCenter,
    /// Can additionally perform endovascular thrombectomy.
    ComprehensiveCenter,
    #[serde(other)]
    Unknown,
}

/// Hospital routing recommendation attached to a prediction.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingRecommendation {
    #[serde(default, rename = "recommendedDestinationHospitalId")]
    pub hospital_id: Option<String>,
    #[serde(default, rename = "recommendedDestinationType")]
    pub destination_type: Option<DestinationType>,
    #[serde(default, rename = "estimatedTravelMinToRecommended")]
    pub travel_minutes: Option<i64>,
    #[serde(default, rename = "estimatedAdditionalDoorToNeedleMinAtRecommended")]
    pub additional_door_to_needle_minutes: Option<i64>,
}

impl RoutingRecommendation {
    /// Total minutes until treatment can start at the recommended center, if known.
    pub fn minutes_to_treatment(&self) -> Option<i64> {
        Some(self.travel_minutes? + self.additional_door_to_needle_minutes.unwrap_or(0))
    }
}

/// Latest vital-sign snapshot from EMS telemetry.
///
/// Known keys are typed; anything else the pipeline sends is kept in `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VitalSigns {
    #[serde(default)]
    pub heart_rate_bpm: Option<f64>,
    #[serde(default, rename = "systolic_bp_mmHg")]
    pub systolic_bp_mmhg: Option<f64>,
    #[serde(default, rename = "diastolic_bp_mmHg")]
    pub diastolic_bp_mmhg: Option<f64>,
    #[serde(default)]
    pub spo2_pct: Option<f64>,
    #[serde(default)]
    pub gcs_total: Option<f64>,
    #[serde(default)]
    pub ecg_rhythm: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Full prediction record for a single case.
///
/// A newer detail for the same case supersedes an older one entirely;
/// details are never merged field by field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionDetail {
    pub prediction_id: String,
    pub case_id: CaseId,
    pub patient_id: PatientId,
    /// ISO-8601 timestamp as sent by the pipeline (may be empty).
    #[serde(default)]
    pub prediction_ts: String,
    pub stroke_probability: Probability,
    pub lvo_probability: Probability,
    pub risk_category: RiskCategory,

    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub minutes_since_onset: Option<i64>,
    #[serde(default)]
    pub is_active: Option<bool>,

    #[serde(flatten)]
    pub routing: RoutingRecommendation,

    #[serde(default)]
    pub time_window_assessment: Option<String>,
    #[serde(default)]
    pub top_risk_factors: Option<Vec<String>>,
    #[serde(default)]
    pub llm_explanation_summary: Option<String>,
    #[serde(default)]
    pub llm_recommended_actions: Option<String>,
    #[serde(default)]
    pub current_vitals: Option<VitalSigns>,

    #[serde(default)]
    pub prediction_confidence: Option<Probability>,
    #[serde(default)]
    pub trend_indicators: Option<Map<String, Value>>,
    #[serde(default)]
    pub detected_anomalies: Option<Vec<String>>,
    #[serde(default)]
    pub feature_importance: Option<BTreeMap<String, f64>>,
}

impl PredictionDetail {
    /// Parsed prediction timestamp, if the pipeline sent a valid RFC 3339 value.
    pub fn predicted_at(&self) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(&self.prediction_ts)
            .ok()
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Risk factors, empty when none were reported.
    pub fn risk_factors(&self) -> &[String] {
        self.top_risk_factors.as_deref().unwrap_or(&[])
    }

    /// Projects the list-view summary carried by this detail.
    pub fn summary(&self) -> CaseSummary {
        CaseSummary {
            case_id: self.case_id.clone(),
            patient_id: self.patient_id.clone(),
            display_name: self
                .display_name
                .clone()
                .unwrap_or_else(|| default_display_name(&self.patient_id)),
            risk_category: self.risk_category,
            stroke_probability: self.stroke_probability,
            lvo_probability: self.lvo_probability,
            minutes_since_onset: self.minutes_since_onset,
            is_active: self.is_active.unwrap_or(true),
        }
    }
}

/// Display label used by the server when no demographics are available.
fn default_display_name(patient_id: &PatientId) -> String {
    let id = patient_id.as_str();
    let tail: String = id
        .chars()
        .rev()
        .take(4)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("Patient {}", tail)
}
