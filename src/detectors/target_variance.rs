// =============================================================================
// Monthly Target Variance Detector
// =============================================================================
//
// Excluded from the automatic four-detector fan-out (spec §4.6 step 1)
// because targets are per-tenant and supplied explicitly, not fetched
// automatically (spec §9 open question).

use crate::clock::Clock;
use crate::detectors::actions;
use crate::detectors::{AnomalyCandidate, AnomalyPayload, NumericEvidence};
use crate::ledger::LedgerStore;
use crate::money::{ratio_pct, Money};
use crate::scorer::{self, Evidence};
use crate::types::{AnomalyKind, Kind, Priority};

#[derive(Debug, Clone, Copy)]
pub struct MonthlyTarget {
    pub target_revenue: Money,
    pub target_expense: Money,
    pub days_in_month: u32,
    pub days_elapsed: u32,
}

pub struct TargetVarianceDetector {
    pub threshold_pct: f64,
    pub detector_prior: u8,
}

impl TargetVarianceDetector {
    pub fn detect(
        &self,
        ledger: &dyn LedgerStore,
        clock: &dyn Clock,
        target: &MonthlyTarget,
    ) -> Option<AnomalyCandidate> {
        let today = clock.today();
        let month_start = today.with_day(1).unwrap_or(today);
        let from = clock.start_of_day(month_start);
        let to = clock.end_of_day(today);

        let actual_revenue = ledger.sum_over(Kind::Income, from, to, None);
        let actual_expense = ledger.sum_over(Kind::Expense, from, to, None);

        let completeness = (target.days_elapsed.max(1) as f64 / target.days_in_month.max(1) as f64)
            .clamp(1.0 / target.days_in_month.max(1) as f64, 1.0);

        let prorated_revenue = target.target_revenue.checked_mul_fraction(
            target.days_elapsed.max(1) as f64,
            target.days_in_month.max(1) as f64,
        )?;
        let prorated_expense = target.target_expense.checked_mul_fraction(
            target.days_elapsed.max(1) as f64,
            target.days_in_month.max(1) as f64,
        )?;

        let revenue_var_pct = ratio_pct(actual_revenue, prorated_revenue)?;
        let expense_var_pct = ratio_pct(actual_expense, prorated_expense)?;

        let revenue_trigger = revenue_var_pct < -self.threshold_pct;
        let expense_trigger = expense_var_pct > self.threshold_pct;

        if !revenue_trigger && !expense_trigger {
            return None;
        }

        let primary = if revenue_trigger && expense_trigger {
            if revenue_var_pct.abs() >= expense_var_pct.abs() {
                revenue_var_pct
            } else {
                expense_var_pct
            }
        } else if revenue_trigger {
            revenue_var_pct
        } else {
            expense_var_pct
        };

        let priority = if primary.abs() > 40.0 {
            Priority::Critical
        } else if primary.abs() > 30.0 {
            Priority::High
        } else {
            Priority::Medium
        };

        let confidence = scorer::score(Evidence {
            current_value: primary,
            baseline_value: self.threshold_pct,
            sample_size: target.days_elapsed as f64,
            data_age_hours: 0.0,
            expected_sample_size: target.days_in_month as f64,
            detector_prior: self.detector_prior,
        });

        let mut related_data = std::collections::HashMap::new();
        related_data.insert("period_completeness".to_string(), serde_json::json!(completeness));
        related_data.insert("revenue_variance_pct".to_string(), serde_json::json!(revenue_var_pct));
        related_data.insert("expense_variance_pct".to_string(), serde_json::json!(expense_var_pct));

        Some(AnomalyCandidate {
            kind: AnomalyKind::TargetVariance,
            priority,
            confidence,
            payload: AnomalyPayload {
                title: "Monthly target variance detected".into(),
                message: format!(
                    "Month-to-date revenue variance is {revenue_var_pct:.1}% and expense variance is {expense_var_pct:.1}% against prorated targets."
                ),
                evidence: NumericEvidence {
                    current: if revenue_trigger { actual_revenue.to_f64() } else { actual_expense.to_f64() },
                    baseline: if revenue_trigger { prorated_revenue.to_f64() } else { prorated_expense.to_f64() },
                    variance_pct: primary,
                    threshold_pct: self.threshold_pct,
                },
                suggested_actions: actions::for_kind(AnomalyKind::TargetVariance)
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
                action_required: Some("Review monthly targets against month-to-date actuals".into()),
                related_data,
            },
        })
    }
}

use chrono::Datelike;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::ledger::{CategoryEntry, InMemoryLedger, NewTransaction};
    use crate::types::ApprovalStatus;
    use chrono::{TimeZone, Utc};

    fn detector() -> TargetVarianceDetector {
        TargetVarianceDetector { threshold_pct: 20.0, detector_prior: 5 }
    }

    #[test]
    fn expense_over_target_triggers() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = InMemoryLedger::new(
            vec![CategoryEntry { name: "ops".into(), kind: Kind::Expense, active: true }],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        let max = Money::from_major_minor(500_000_000, 0);
        ledger
            .create(
                NewTransaction {
                    owner_id: owner,
                    kind: Kind::Expense,
                    category: "ops".into(),
                    amount: Money::from_major_minor(900_000, 0),
                    description: None,
                    approval_status: ApprovalStatus::Approved,
                    approved_by: None,
                    event_timestamp: clock.now(),
                },
                &clock,
                max,
            )
            .unwrap();

        let target = MonthlyTarget {
            target_revenue: Money::from_major_minor(3_000_000, 0),
            target_expense: Money::from_major_minor(1_000_000, 0),
            days_in_month: 30,
            days_elapsed: 15,
        };
        let candidate = detector().detect(&ledger, &clock, &target);
        assert!(candidate.is_some());
    }

    #[test]
    fn on_target_does_not_trigger() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner = uuid::Uuid::new_v4();
        let ledger = InMemoryLedger::new(
            vec![
                CategoryEntry { name: "sales".into(), kind: Kind::Income, active: true },
                CategoryEntry { name: "ops".into(), kind: Kind::Expense, active: true },
            ],
            100,
            0,
            std::sync::Arc::new(crate::audit::InMemoryAuditLog::new()),
        );
        let max = Money::from_major_minor(500_000_000, 0);
        // Prorated targets at day 15/30 are 1,500,000 revenue / 500,000 expense.
        ledger
            .create(
                NewTransaction { owner_id: owner, kind: Kind::Income, category: "sales".into(), amount: Money::from_major_minor(1_500_000, 0), description: None, approval_status: ApprovalStatus::Approved, approved_by: None, event_timestamp: clock.now() },
                &clock,
                max,
            )
            .unwrap();
        ledger
            .create(
                NewTransaction { owner_id: owner, kind: Kind::Expense, category: "ops".into(), amount: Money::from_major_minor(500_000, 0), description: None, approval_status: ApprovalStatus::Approved, approved_by: None, event_timestamp: clock.now() },
                &clock,
                max,
            )
            .unwrap();
        let target = MonthlyTarget {
            target_revenue: Money::from_major_minor(3_000_000, 0),
            target_expense: Money::from_major_minor(1_000_000, 0),
            days_in_month: 30,
            days_elapsed: 15,
        };
        assert!(detector().detect(&ledger, &clock, &target).is_none());
    }
}
