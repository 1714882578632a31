// =============================================================================
// Consecutive Negative Cashflow Detector
// =============================================================================

use crate::clock::Clock;
use crate::detectors::actions;
use crate::detectors::{AnomalyCandidate, AnomalyPayload, NumericEvidence};
use crate::ledger::LedgerStore;
use crate::money::Money;
use crate::scorer::{self, Evidence};
use crate::types::{AnomalyKind, Priority};

pub struct CashflowDetector {
    pub lookback_days: u32,
    pub run_threshold: u32,
    pub detector_prior: u8,
}

fn longest_negative_run(net_cashflows: &[Money]) -> (u32, u32) {
    let mut longest = 0u32;
    let mut current = 0u32;
    for nc in net_cashflows {
        if !nc.is_positive() && !nc.is_zero() {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }
    (longest, net_cashflows.iter().filter(|nc| !nc.is_positive() && !nc.is_zero()).count() as u32)
}

impl CashflowDetector {
    pub fn detect(&self, ledger: &dyn LedgerStore, clock: &dyn Clock) -> Option<AnomalyCandidate> {
        let today = clock.today();
        let start = today - chrono::Duration::days(self.lookback_days as i64 - 1);
        let buckets = ledger.day_buckets_for_range(start, today, None, clock);

        let net_flows: Vec<Money> = buckets.iter().map(|b| b.net_cashflow).collect();
        let (run_length, negative_day_count) = longest_negative_run(&net_flows);

        if run_length < self.run_threshold {
            return None;
        }

        let total_deficit: Money = buckets
            .iter()
            .filter(|b| !b.net_cashflow.is_positive() && !b.net_cashflow.is_zero())
            .map(|b| -b.net_cashflow)
            .sum();

        let total_days = buckets.len().max(1) as f64;
        let negative_ratio = negative_day_count as f64 / total_days;

        let priority = if run_length >= 5 {
            Priority::Critical
        } else if run_length == 4 {
            Priority::High
        } else {
            Priority::Medium
        };

        let confidence = scorer::score(Evidence {
            current_value: run_length as f64,
            baseline_value: self.run_threshold as f64,
            sample_size: buckets.len() as f64,
            data_age_hours: 0.0,
            expected_sample_size: self.lookback_days as f64,
            detector_prior: self.detector_prior,
        });

        let mut related_data = std::collections::HashMap::new();
        related_data.insert("longest_run_days".to_string(), serde_json::json!(run_length));
        related_data.insert("negative_day_ratio".to_string(), serde_json::json!(negative_ratio));

        Some(AnomalyCandidate {
            kind: AnomalyKind::CashflowWarning,
            priority,
            confidence,
            payload: AnomalyPayload {
                title: "Consecutive negative cashflow detected".into(),
                message: format!(
                    "Net cashflow has been negative for {run_length} consecutive day(s), totaling a deficit of {total_deficit}."
                ),
                evidence: NumericEvidence {
                    current: run_length as f64,
                    baseline: self.run_threshold as f64,
                    variance_pct: negative_ratio * 100.0,
                    threshold_pct: self.run_threshold as f64,
                },
                suggested_actions: actions::for_kind(AnomalyKind::CashflowWarning)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                action_required: Some("Review upcoming payables against cash on hand".into()),
                related_data,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::{CategoryEntry, InMemoryLedger, NewTransaction};
    use crate::types::{ApprovalStatus, Kind};
    use chrono::{Duration, TimeZone, Utc};

    fn detector(threshold: u32) -> CashflowDetector {
        CashflowDetector { lookback_days: 7, run_threshold: threshold, detector_prior: 5 }
    }

    /// Seeds 7 days (oldest to newest, index 0 = 6 days ago) with the given
    /// net-cashflow signs: true = negative day, false = positive day.
    fn seed(clock: &FixedClock, owner: uuid::Uuid, signs: [bool; 7]) -> InMemoryLedger {
        let ledger = InMemoryLedger::new(
            vec![
                CategoryEntry { name: "ops".into(), kind: Kind::Expense, active: true },
                CategoryEntry { name: "sales".into(), kind: Kind::Income, active: true },
            ],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        let max = Money::from_major_minor(500_000_000, 0);
        for (i, negative) in signs.iter().enumerate() {
            let days_ago = 6 - i as i64;
            let ts = clock.now() - Duration::days(days_ago);
            if *negative {
                ledger
                    .create(
                        NewTransaction { owner_id: owner, kind: Kind::Expense, category: "ops".into(), amount: Money::from_major_minor(100, 0), description: None, approval_status: ApprovalStatus::Approved, approved_by: None, event_timestamp: ts },
                        clock,
                        max,
                    )
                    .unwrap();
            } else {
                ledger
                    .create(
                        NewTransaction { owner_id: owner, kind: Kind::Income, category: "sales".into(), amount: Money::from_major_minor(100, 0), description: None, approval_status: ApprovalStatus::Approved, approved_by: None, event_timestamp: ts },
                        clock,
                        max,
                    )
                    .unwrap();
            }
        }
        ledger
    }

    #[test]
    fn scenario_c_longest_run_of_three_triggers_at_threshold_three() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        // signs: [-,-,-,+,-,-,-] -> longest run = 3
        let ledger = seed(&clock, owner, [true, true, true, false, true, true, true]);
        let candidate = detector(3).detect(&ledger, &clock).expect("run of 3 should trigger at threshold 3");
        assert_eq!(candidate.priority, crate::types::Priority::Medium);
    }

    #[test]
    fn scenario_c_nil_at_threshold_four() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = seed(&clock, owner, [true, true, true, false, true, true, true]);
        assert!(detector(4).detect(&ledger, &clock).is_none());
    }

    #[test]
    fn run_of_five_is_critical() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = seed(&clock, owner, [true, true, true, true, true, false, false]);
        let candidate = detector(3).detect(&ledger, &clock).unwrap();
        assert_eq!(candidate.priority, crate::types::Priority::Critical);
    }
}
