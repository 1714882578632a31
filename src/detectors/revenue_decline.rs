// =============================================================================
// Revenue Decline Detector (weekly)
// =============================================================================

use crate::clock::Clock;
use crate::detectors::actions;
use crate::detectors::{spike_priority, AnomalyCandidate, AnomalyPayload, NumericEvidence};
use crate::ledger::LedgerStore;
use crate::money::ratio_pct;
use crate::scorer::{self, Evidence};
use crate::types::AnomalyKind;

pub struct RevenueDeclineDetector {
    pub threshold_pct: f64,
    pub detector_prior: u8,
}

impl RevenueDeclineDetector {
    pub fn detect(&self, ledger: &dyn LedgerStore, clock: &dyn Clock) -> Option<AnomalyCandidate> {
        let today = clock.today();
        let this_week_start = clock.start_of_day(today - chrono::Duration::days(6));
        let this_week_end = clock.end_of_day(today);
        let prev_week_start = clock.start_of_day(today - chrono::Duration::days(13));
        let prev_week_end = clock.end_of_day(today - chrono::Duration::days(7));

        let this_week_revenue = ledger.sum_over(crate::types::Kind::Income, this_week_start, this_week_end, None);
        let prev_week_revenue = ledger.sum_over(crate::types::Kind::Income, prev_week_start, prev_week_end, None);

        if prev_week_revenue.is_zero() {
            return None;
        }

        let variance_pct = ratio_pct(this_week_revenue, prev_week_revenue)?;
        if variance_pct >= -self.threshold_pct {
            return None;
        }

        let priority = spike_priority(variance_pct.abs(), self.threshold_pct);
        let confidence = scorer::score(Evidence {
            current_value: this_week_revenue.to_f64(),
            baseline_value: prev_week_revenue.to_f64(),
            sample_size: 14.0,
            data_age_hours: 0.0,
            expected_sample_size: 14.0,
            detector_prior: self.detector_prior,
        });

        Some(AnomalyCandidate {
            kind: AnomalyKind::RevenueDecline,
            priority,
            confidence,
            payload: AnomalyPayload {
                title: "Revenue decline detected".into(),
                message: format!(
                    "This week's revenue is {:.1}% below the previous week.",
                    variance_pct.abs()
                ),
                evidence: NumericEvidence {
                    current: this_week_revenue.to_f64(),
                    baseline: prev_week_revenue.to_f64(),
                    variance_pct,
                    threshold_pct: self.threshold_pct,
                },
                suggested_actions: actions::for_kind(AnomalyKind::RevenueDecline)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                action_required: Some("Review income recording for the past week".into()),
                related_data: Default::default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::{CategoryEntry, InMemoryLedger, NewTransaction};
    use crate::money::Money;
    use crate::types::{ApprovalStatus, Kind};
    use chrono::{Duration, TimeZone, Utc};

    fn detector() -> RevenueDeclineDetector {
        RevenueDeclineDetector { threshold_pct: 15.0, detector_prior: 5 }
    }

    #[test]
    fn scenario_prev_week_zero_never_triggers() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let ledger = InMemoryLedger::new(
            vec![CategoryEntry { name: "sales".into(), kind: Kind::Income, active: true }],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        assert!(detector().detect(&ledger, &clock).is_none());
    }

    #[test]
    fn decline_beyond_threshold_triggers() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = InMemoryLedger::new(
            vec![CategoryEntry { name: "sales".into(), kind: Kind::Income, active: true }],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        let max = Money::from_major_minor(500_000_000, 0);
        // Previous week: 7 days of 100,000 income each -> 700,000.
        for days_ago in 7..=13 {
            ledger
                .create(
                    NewTransaction {
                        owner_id: owner,
                        kind: Kind::Income,
                        category: "sales".into(),
                        amount: Money::from_major_minor(100_000, 0),
                        description: None,
                        approval_status: ApprovalStatus::Approved,
                        approved_by: None,
                        event_timestamp: clock.now() - Duration::days(days_ago),
                    },
                    &clock,
                    max,
                )
                .unwrap();
        }
        // This week: 7 days of 50,000 income each -> 350,000 (-50%).
        for days_ago in 0..=6 {
            ledger
                .create(
                    NewTransaction {
                        owner_id: owner,
                        kind: Kind::Income,
                        category: "sales".into(),
                        amount: Money::from_major_minor(50_000, 0),
                        description: None,
                        approval_status: ApprovalStatus::Approved,
                        approved_by: None,
                        event_timestamp: clock.now() - Duration::days(days_ago),
                    },
                    &clock,
                    max,
                )
                .unwrap();
        }
        let candidate = detector().detect(&ledger, &clock).expect("decline should trigger");
        assert_eq!(candidate.kind, AnomalyKind::RevenueDecline);
    }
}
