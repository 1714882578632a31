// =============================================================================
// Anomaly Detectors
// =============================================================================
//
// Four independent detectors that consume Ledger aggregations and emit
// candidate anomalies. Each runs read-only against the Clock and Ledger and
// never writes state. Structured as a config-carrying struct with a
// `detect` method, mirroring the teacher's `RegimeDetector`/`CusumDetector`
// shape.

pub mod actions;
pub mod cashflow;
pub mod expense_spike;
pub mod revenue_decline;
pub mod target_variance;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::types::{AnomalyKind, Priority};

/// Numeric evidence rendered into the "Data" block of a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NumericEvidence {
    pub current: f64,
    pub baseline: f64,
    pub variance_pct: f64,
    pub threshold_pct: f64,
}

/// Restricted to string-keyed primitive values (spec §9: tagged union with
/// a shared relatedData map restricted to primitives).
pub type RelatedData = HashMap<String, serde_json::Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyPayload {
    pub title: String,
    pub message: String,
    pub evidence: NumericEvidence,
    pub suggested_actions: Vec<String>,
    pub action_required: Option<String>,
    pub related_data: RelatedData,
}

/// Produced by a detector; not persistent until the gating step accepts it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnomalyCandidate {
    pub kind: AnomalyKind,
    pub priority: Priority,
    pub confidence: u8,
    pub payload: AnomalyPayload,
}

/// Priority ladder shared by expense-spike and revenue-decline detectors:
/// critical above 2x threshold, high above 1.5x, medium otherwise.
pub fn spike_priority(abs_variance_pct: f64, threshold_pct: f64) -> Priority {
    if abs_variance_pct > 2.0 * threshold_pct {
        Priority::Critical
    } else if abs_variance_pct > 1.5 * threshold_pct {
        Priority::High
    } else {
        Priority::Medium
    }
}
