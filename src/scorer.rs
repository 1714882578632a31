// =============================================================================
// Confidence Scorer
// =============================================================================
//
// Pure, total function turning anomaly evidence into a 0-100 score. Mirrors
// the teacher's classify/remap pair of small clamped pure functions.

/// Inputs to the confidence scorer.
#[derive(Debug, Clone, Copy)]
pub struct Evidence {
    pub current_value: f64,
    pub baseline_value: f64,
    pub sample_size: f64,
    pub data_age_hours: f64,
    pub expected_sample_size: f64,
    pub detector_prior: u8,
}

const EPSILON: f64 = 1e-9;

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    value.max(min).min(max)
}

/// Signal strength term (0-50), monotone in relative deviation from
/// baseline. Detectors that reason about consecutive-day counts (the
/// cashflow detector) pass that ratio directly as `current_value` against a
/// `baseline_value` of 1.0.
fn signal_strength(current: f64, baseline: f64) -> f64 {
    let relative = (current - baseline).abs() / baseline.abs().max(EPSILON);
    clamp(relative * 50.0, 0.0, 50.0)
}

/// Sample adequacy term (0-25), monotone in sample coverage.
fn sample_adequacy(sample_size: f64, expected: f64) -> f64 {
    if expected <= 0.0 {
        return 0.0;
    }
    clamp(sample_size / expected, 0.0, 1.0) * 25.0
}

/// Data freshness term (0-15), decaying linearly with age.
fn data_freshness(age_hours: f64) -> f64 {
    clamp(15.0 - age_hours, 0.0, 15.0)
}

/// Detector-specific prior term (0-10).
fn detector_prior_term(prior: u8) -> f64 {
    clamp(prior as f64, 0.0, 10.0)
}

/// Computes the confidence score in [0, 100]. Deterministic and stable
/// under re-computation with the same inputs.
pub fn score(evidence: Evidence) -> u8 {
    let total = signal_strength(evidence.current_value, evidence.baseline_value)
        + sample_adequacy(evidence.sample_size, evidence.expected_sample_size)
        + data_freshness(evidence.data_age_hours)
        + detector_prior_term(evidence.detector_prior);
    clamp(total, 0.0, 100.0).round() as u8
}
