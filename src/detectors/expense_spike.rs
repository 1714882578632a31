// =============================================================================
// Expense Spike Detector (daily)
// =============================================================================

use crate::clock::Clock;
use crate::detectors::actions;
use crate::detectors::{spike_priority, AnomalyCandidate, AnomalyPayload, NumericEvidence};
use crate::ledger::LedgerStore;
use crate::money::ratio_pct;
use crate::scorer::{self, Evidence};
use crate::types::AnomalyKind;

pub struct ExpenseSpikeDetector {
    pub threshold_pct: f64,
    pub detector_prior: u8,
}

impl ExpenseSpikeDetector {
    pub fn detect(&self, ledger: &dyn LedgerStore, clock: &dyn Clock) -> Option<AnomalyCandidate> {
        let today = clock.today();
        let window_start = today - chrono::Duration::days(7);
        let buckets = ledger.day_buckets_for_range(window_start, today, None, clock);

        let today_expense = buckets.iter().find(|b| b.date == today)?.total_expense;
        let prior_days: Vec<_> = buckets.iter().filter(|b| b.date != today).collect();
        if prior_days.is_empty() {
            return None;
        }
        let avg7 = prior_days.iter().map(|b| b.total_expense).sum::<crate::money::Money>()
            .checked_div(rust_decimal::Decimal::from(prior_days.len() as i64))?;

        if avg7.is_zero() {
            return None;
        }

        let variance_pct = ratio_pct(today_expense, avg7)?;
        if variance_pct <= self.threshold_pct {
            return None;
        }

        let priority = spike_priority(variance_pct, self.threshold_pct);
        let confidence = scorer::score(Evidence {
            current_value: today_expense.to_f64(),
            baseline_value: avg7.to_f64(),
            sample_size: prior_days.len() as f64,
            data_age_hours: 0.0,
            expected_sample_size: 7.0,
            detector_prior: self.detector_prior,
        });

        Some(AnomalyCandidate {
            kind: AnomalyKind::ExpenseSpike,
            priority,
            confidence,
            payload: AnomalyPayload {
                title: "Expense spike detected".into(),
                message: format!(
                    "Today's expenses are {:.1}% above the 7-day average.",
                    variance_pct
                ),
                evidence: NumericEvidence {
                    current: today_expense.to_f64(),
                    baseline: avg7.to_f64(),
                    variance_pct,
                    threshold_pct: self.threshold_pct,
                },
                suggested_actions: actions::for_kind(AnomalyKind::ExpenseSpike)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                action_required: Some("Review today's expense entries".into()),
                related_data: Default::default(),
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::{CategoryEntry, InMemoryLedger, LedgerStore, NewTransaction};
    use crate::money::Money;
    use crate::types::{ApprovalStatus, Kind};
    use chrono::{Duration, TimeZone, Utc};

    fn detector() -> ExpenseSpikeDetector {
        ExpenseSpikeDetector { threshold_pct: 30.0, detector_prior: 5 }
    }

    fn seeded_ledger(clock: &FixedClock, owner: uuid::Uuid, today_amount: i64) -> InMemoryLedger {
        let ledger = InMemoryLedger::new(
            vec![CategoryEntry { name: "ops".into(), kind: Kind::Expense, active: true }],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        let max = Money::from_major_minor(500_000_000, 0);
        for days_ago in 1..=7 {
            let ts = clock.now() - Duration::days(days_ago);
            ledger
                .create(
                    NewTransaction {
                        owner_id: owner,
                        kind: Kind::Expense,
                        category: "ops".into(),
                        amount: Money::from_major_minor(100_000, 0),
                        description: None,
                        approval_status: ApprovalStatus::Approved,
                        approved_by: None,
                        event_timestamp: ts,
                    },
                    clock,
                    max,
                )
                .unwrap();
        }
        ledger
            .create(
                NewTransaction {
                    owner_id: owner,
                    kind: Kind::Expense,
                    category: "ops".into(),
                    amount: Money::from_major_minor(today_amount, 0),
                    description: None,
                    approval_status: ApprovalStatus::Approved,
                    approved_by: None,
                    event_timestamp: clock.now(),
                },
                clock,
                max,
            )
            .unwrap();
        ledger
    }

    #[test]
    fn scenario_a_spike_triggers_critical() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = seeded_ledger(&clock, owner, 200_000);
        let candidate = detector().detect(&ledger, &clock).expect("spike should trigger");
        assert_eq!(candidate.priority, crate::types::Priority::Critical);
        assert!(candidate.confidence >= 80);
    }

    #[test]
    fn no_spike_below_threshold() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = seeded_ledger(&clock, owner, 110_000);
        assert!(detector().detect(&ledger, &clock).is_none());
    }

    #[test]
    fn avg7_zero_never_triggers() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = InMemoryLedger::new(
            vec![CategoryEntry { name: "ops".into(), kind: Kind::Expense, active: true }],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        ledger
            .create(
                NewTransaction {
                    owner_id: owner,
                    kind: Kind::Expense,
                    category: "ops".into(),
                    amount: Money::from_major_minor(50_000, 0),
                    description: None,
                    approval_status: ApprovalStatus::Approved,
                    approved_by: None,
                    event_timestamp: clock.now(),
                },
                &clock,
                Money::from_major_minor(500_000_000, 0),
            )
            .unwrap();
        assert!(detector().detect(&ledger, &clock).is_none());
    }
}
