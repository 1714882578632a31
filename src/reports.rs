// =============================================================================
// Public Query Surface
// =============================================================================
//
// Role-scoped listing used by dashboards (spec §4.9). Pure read path over
// `LedgerStore`; scoping is resolved once here so no handler can forget to
// scope a query ad hoc. Grounded on the teacher's `app_state::build_snapshot`
// pattern: a single function assembling a read-only DTO from several
// independently-locked substructures.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ledger::{LedgerStore, OwnerQuery, Transaction};
use crate::money::{share_pct, Money};
use crate::trends::{target_comparison, TargetComparison};
use crate::types::{Kind, Role, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_income: Money,
    pub total_expense: Money,
    pub net_cashflow: Money,
    pub transaction_count: u32,
    pub average_transaction: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryBreakdown {
    pub category: String,
    pub total: Money,
    pub count: u32,
    pub percentage_of_total: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionView {
    pub id: uuid::Uuid,
    pub kind: Kind,
    pub category: String,
    pub amount: Money,
    pub event_timestamp: DateTime<Utc>,
}

impl From<&Transaction> for TransactionView {
    fn from(t: &Transaction) -> Self {
        Self { id: t.id, kind: t.kind, category: t.category.clone(), amount: t.amount, event_timestamp: t.event_timestamp }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportTrends {
    pub vs_yesterday_pct: Option<f64>,
    pub vs_seven_day_avg_pct: Option<f64>,
    pub vs_monthly_target: Option<TargetComparison>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleReport {
    pub summary: Summary,
    pub category_breakdown: Vec<CategoryBreakdown>,
    pub top_transactions: Vec<TransactionView>,
    pub trends: ReportTrends,
}

/// Targets supplied for the optional vs-monthly-target trend line.
#[derive(Debug, Clone, Copy)]
pub struct MonthlyTargets {
    pub target_income: Money,
    pub target_expense: Money,
}

fn summarize(transactions: &[Transaction]) -> Summary {
    let total_income: Money = transactions.iter().filter(|t| t.kind == Kind::Income).map(|t| t.amount).sum();
    let total_expense: Money = transactions.iter().filter(|t| t.kind == Kind::Expense).map(|t| t.amount).sum();
    let count = transactions.len() as u32;
    let total: Money = transactions.iter().map(|t| t.amount).sum();
    let average = total.checked_div(rust_decimal::Decimal::from(count.max(1))).unwrap_or(Money::ZERO);
    Summary {
        total_income,
        total_expense,
        net_cashflow: total_income - total_expense,
        transaction_count: count,
        average_transaction: average,
    }
}

fn category_breakdown(transactions: &[Transaction]) -> Vec<CategoryBreakdown> {
    let grand_total: Money = transactions.iter().map(|t| t.amount).sum();
    let mut by_category: HashMap<String, (Money, u32)> = HashMap::new();
    for t in transactions {
        let entry = by_category.entry(t.category.clone()).or_insert((Money::ZERO, 0));
        entry.0 += t.amount;
        entry.1 += 1;
    }
    let mut rows: Vec<CategoryBreakdown> = by_category
        .into_iter()
        .map(|(category, (total, count))| CategoryBreakdown {
            category,
            total,
            count,
            percentage_of_total: share_pct(total, grand_total),
        })
        .collect();
    rows.sort_by(|a, b| b.total.cmp(&a.total));
    rows
}

fn top_transactions(transactions: &[Transaction], role: Role) -> Vec<TransactionView> {
    if role == Role::Investor {
        return Vec::new();
    }
    let mut rows: Vec<&Transaction> = transactions.iter().collect();
    rows.sort_by(|a, b| b.amount.cmp(&a.amount));
    rows.into_iter().take(5).map(TransactionView::from).collect()
}

/// Builds a role-scoped report over `[from, to]` (inclusive), approved
/// transactions only. `owner_id` is forced for the `employee` role
/// regardless of what the caller passes (spec §4.9 scoping rule).
pub fn build_role_report(
    ledger: &dyn LedgerStore,
    role: Role,
    owner_id: Option<UserId>,
    from: DateTime<Utc>,
    to: DateTime<Utc>,
    yesterday: Option<(Money, Money)>,
    seven_day_avg: Option<(Money, Money)>,
    monthly_targets: Option<MonthlyTargets>,
    today_totals: Option<(Money, Money)>,
) -> RoleReport {
    let query = OwnerQuery { from: Some(from), to: Some(to), kind: None, limit: None, offset: None };
    let transactions: Vec<Transaction> = match (role, owner_id) {
        (Role::Employee, Some(owner)) => ledger.find_by_owner(owner, query),
        (Role::Employee, None) => Vec::new(),
        _ => ledger.find_all(query),
    };
    let transactions: Vec<Transaction> = transactions.into_iter().filter(|t| t.is_approved()).collect();

    let vs_yesterday_pct = today_totals.zip(yesterday).and_then(|((ti, te), (yi, ye))| {
        let today_net = ti - te;
        let yesterday_net = yi - ye;
        crate::money::ratio_pct(today_net, yesterday_net)
    });
    let vs_seven_day_avg_pct = today_totals.zip(seven_day_avg).and_then(|((ti, te), (ai, ae))| {
        let today_net = ti - te;
        let avg_net = ai - ae;
        crate::money::ratio_pct(today_net, avg_net)
    });
    let vs_monthly_target = monthly_targets.map(|targets| {
        let actual_income: Money = transactions.iter().filter(|t| t.kind == Kind::Income).map(|t| t.amount).sum();
        let actual_expense: Money = transactions.iter().filter(|t| t.kind == Kind::Expense).map(|t| t.amount).sum();
        target_comparison(actual_income, targets.target_income, actual_expense, targets.target_expense)
    });

    RoleReport {
        summary: summarize(&transactions),
        category_breakdown: category_breakdown(&transactions),
        top_transactions: top_transactions(&transactions, role),
        trends: ReportTrends { vs_yesterday_pct, vs_seven_day_avg_pct, vs_monthly_target },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Clock, FixedClock};
    use crate::audit::InMemoryAuditLog;
    use crate::ledger::{CategoryEntry, InMemoryLedger, NewTransaction};
    use crate::types::ApprovalStatus;
    use chrono::TimeZone;
    use uuid::Uuid;

    fn ledger_with(owner_a: Uuid, owner_b: Uuid, clock: &FixedClock) -> InMemoryLedger {
        let ledger = InMemoryLedger::new(
            vec![
                CategoryEntry { name: "sales".into(), kind: Kind::Income, active: true },
                CategoryEntry { name: "ops".into(), kind: Kind::Expense, active: true },
            ],
            100,
            0,
            std::sync::Arc::new(InMemoryAuditLog::new()),
        );
        let max = Money::from_major_minor(500_000_000, 0);
        ledger.create(NewTransaction { owner_id: owner_a, kind: Kind::Income, category: "sales".into(), amount: Money::from_major_minor(500_000, 0), description: None, approval_status: ApprovalStatus::Approved, approved_by: None, event_timestamp: clock.now() }, clock, max).unwrap();
        ledger.create(NewTransaction { owner_id: owner_b, kind: Kind::Expense, category: "ops".into(), amount: Money::from_major_minor(100_000, 0), description: None, approval_status: ApprovalStatus::Approved, approved_by: None, event_timestamp: clock.now() }, clock, max).unwrap();
        ledger
    }

    #[test]
    fn employee_sees_only_own_transactions() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();
        let ledger = ledger_with(owner_a, owner_b, &clock);
        let from = clock.start_of_day(clock.today());
        let to = clock.end_of_day(clock.today());
        let report = build_role_report(&ledger, Role::Employee, Some(owner_a), from, to, None, None, None, None);
        assert_eq!(report.summary.transaction_count, 1);
        assert_eq!(report.summary.total_income, Money::from_major_minor(500_000, 0));
    }

    #[test]
    fn boss_sees_full_visibility() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();
        let ledger = ledger_with(owner_a, owner_b, &clock);
        let from = clock.start_of_day(clock.today());
        let to = clock.end_of_day(clock.today());
        let report = build_role_report(&ledger, Role::Boss, None, from, to, None, None, None, None);
        assert_eq!(report.summary.transaction_count, 2);
    }

    #[test]
    fn investor_never_sees_individual_transactions() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();
        let ledger = ledger_with(owner_a, owner_b, &clock);
        let from = clock.start_of_day(clock.today());
        let to = clock.end_of_day(clock.today());
        let report = build_role_report(&ledger, Role::Investor, None, from, to, None, None, None, None);
        assert!(report.top_transactions.is_empty());
        assert_eq!(report.summary.transaction_count, 2);
    }

    #[test]
    fn category_breakdown_percentages_sum_to_total() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar);
        let owner_a = Uuid::new_v4();
        let owner_b = Uuid::new_v4();
        let ledger = ledger_with(owner_a, owner_b, &clock);
        let from = clock.start_of_day(clock.today());
        let to = clock.end_of_day(clock.today());
        let report = build_role_report(&ledger, Role::Dev, None, from, to, None, None, None, None);
        let sum: f64 = report.category_breakdown.iter().map(|c| c.percentage_of_total).sum();
        assert!((sum - 100.0).abs() < 1e-6);
    }
}
