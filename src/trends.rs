// =============================================================================
// Trend & Period Comparison
// =============================================================================
//
// Pure statistics over day-buckets: 90-day trend, weekly groupings, period
// comparison, and target comparison (spec §4.8). Population standard
// deviation and the sparkline bucketing mirror the teacher's
// `indicators::bollinger::calculate_bollinger` shape — a plain function over
// a slice, returning a result struct, with degenerate input handled
// explicitly rather than panicking.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::ledger::DailyBucket;
use crate::money::{share_pct, Money};

const SPARKLINE_GLYPHS: [char; 8] = ['\u{2581}', '\u{2582}', '\u{2583}', '\u{2584}', '\u{2585}', '\u{2586}', '\u{2587}', '\u{2588}'];
const SPARKLINE_MAX_POINTS: usize = 50;

fn population_std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Symmetric percent difference, normalized by the average of the two
/// magnitudes so that `growth_rate_pct(a, b) == -growth_rate_pct(b, a)` for
/// every pair (spec §4.8 period-comparison symmetry). `0.0` only when both
/// inputs are zero; a single zero input is handled by the same formula
/// rather than a special-cased 100%, so the sign-flip law holds there too.
fn growth_rate_pct(first: f64, last: f64) -> f64 {
    if first == 0.0 && last == 0.0 {
        return 0.0;
    }
    let denom = (first.abs() + last.abs()) / 2.0;
    (last - first) / denom * 100.0
}

fn sparkline(net_cashflows: &[Money]) -> String {
    if net_cashflows.is_empty() {
        return String::new();
    }
    let values: Vec<f64> = net_cashflows.iter().map(|m| m.to_f64()).collect();
    let sampled: Vec<f64> = if values.len() <= SPARKLINE_MAX_POINTS {
        values
    } else {
        let stride = values.len() as f64 / SPARKLINE_MAX_POINTS as f64;
        (0..SPARKLINE_MAX_POINTS).map(|i| values[((i as f64 * stride) as usize).min(values.len() - 1)]).collect()
    };

    let min = sampled.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = sampled.iter().cloned().fold(f64::NEG_INFINITY, f64::max);

    sampled
        .iter()
        .map(|v| {
            if (max - min).abs() < f64::EPSILON {
                SPARKLINE_GLYPHS[SPARKLINE_GLYPHS.len() / 2]
            } else {
                let normalized = (v - min) / (max - min);
                let idx = ((normalized * (SPARKLINE_GLYPHS.len() - 1) as f64).round() as usize).min(SPARKLINE_GLYPHS.len() - 1);
                SPARKLINE_GLYPHS[idx]
            }
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SeriesStats {
    pub total: Money,
    pub average_per_day: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NinetyDayTrend {
    pub income: SeriesStats,
    pub expense: SeriesStats,
    pub net: SeriesStats,
    pub income_growth_pct: f64,
    pub expense_growth_pct: f64,
    pub profit_margin_trend_pct: f64,
    pub volatility: f64,
    pub sparkline: String,
    pub peak_day: NaiveDate,
    pub lowest_day: NaiveDate,
}

fn margin_pct(income: Money, expense: Money) -> f64 {
    let net = income - expense;
    share_pct(net, income)
}

/// Builds the 90-day trend ending at (and including) `buckets`'s last day.
/// `buckets` must be supplied in ascending-date order, exactly 90 entries
/// (callers obtain this via `LedgerStore::day_buckets_for_range`).
pub fn ninety_day_trend(buckets: &[DailyBucket]) -> Option<NinetyDayTrend> {
    if buckets.is_empty() {
        return None;
    }

    let days = buckets.len() as i64;
    let income_total: Money = buckets.iter().map(|b| b.total_income).sum();
    let expense_total: Money = buckets.iter().map(|b| b.total_expense).sum();
    let net_total: Money = buckets.iter().map(|b| b.net_cashflow).sum();

    let first_week = &buckets[..buckets.len().min(7)];
    let last_week = &buckets[buckets.len().saturating_sub(7)..];

    let first_week_income: Money = first_week.iter().map(|b| b.total_income).sum();
    let last_week_income: Money = last_week.iter().map(|b| b.total_income).sum();
    let first_week_expense: Money = first_week.iter().map(|b| b.total_expense).sum();
    let last_week_expense: Money = last_week.iter().map(|b| b.total_expense).sum();

    let first_week_margin = margin_pct(first_week_income, first_week_expense);
    let last_week_margin = margin_pct(last_week_income, last_week_expense);

    let net_series: Vec<f64> = buckets.iter().map(|b| b.net_cashflow.to_f64()).collect();

    let mut peak = buckets[0];
    let mut lowest = buckets[0];
    for bucket in buckets {
        if bucket.net_cashflow >= peak.net_cashflow {
            peak = *bucket;
        }
        if bucket.net_cashflow <= lowest.net_cashflow {
            lowest = *bucket;
        }
    }

    Some(NinetyDayTrend {
        income: SeriesStats { total: income_total, average_per_day: income_total.checked_div(days.into()).unwrap_or(Money::ZERO) },
        expense: SeriesStats { total: expense_total, average_per_day: expense_total.checked_div(days.into()).unwrap_or(Money::ZERO) },
        net: SeriesStats { total: net_total, average_per_day: net_total.checked_div(days.into()).unwrap_or(Money::ZERO) },
        income_growth_pct: growth_rate_pct(first_week_income.to_f64(), last_week_income.to_f64()),
        expense_growth_pct: growth_rate_pct(first_week_expense.to_f64(), last_week_expense.to_f64()),
        profit_margin_trend_pct: last_week_margin - first_week_margin,
        volatility: population_std_dev(&net_series),
        sparkline: sparkline(&buckets.iter().map(|b| b.net_cashflow).collect::<Vec<_>>()),
        peak_day: peak.date,
        lowest_day: lowest.date,
    })
}

/// Thirteen consecutive 7-day groupings of `ninety_day_trend`'s inputs.
pub fn weekly_trend(buckets: &[DailyBucket]) -> Vec<NinetyDayTrend> {
    buckets.chunks(7).filter_map(ninety_day_trend).collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverallTrend {
    Improving,
    Stable,
    Declining,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct MetricDelta {
    pub absolute: f64,
    pub percent: f64,
    pub significant: bool,
}

fn metric_delta(current: f64, previous: f64) -> MetricDelta {
    let absolute = current - previous;
    let percent = growth_rate_pct(previous, current);
    MetricDelta { absolute, percent, significant: percent.abs() > 15.0 }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodComparison {
    pub income: MetricDelta,
    pub expense: MetricDelta,
    pub net_cashflow: MetricDelta,
    pub transaction_count: MetricDelta,
    pub overall_trend: OverallTrend,
    pub summary: String,
    pub highlights: Vec<String>,
}

#[derive(Debug, Clone, Copy)]
pub struct PeriodTotals {
    pub income: Money,
    pub expense: Money,
    pub transaction_count: u32,
}

pub fn period_comparison(current: PeriodTotals, previous: PeriodTotals) -> PeriodComparison {
    let current_net = current.income - current.expense;
    let previous_net = previous.income - previous.expense;

    let income = metric_delta(current.income.to_f64(), previous.income.to_f64());
    let expense = metric_delta(current.expense.to_f64(), previous.expense.to_f64());
    let net_cashflow = metric_delta(current_net.to_f64(), previous_net.to_f64());
    let transaction_count = metric_delta(current.transaction_count as f64, previous.transaction_count as f64);

    let overall_trend = if net_cashflow.significant && net_cashflow.percent > 0.0 {
        OverallTrend::Improving
    } else if net_cashflow.significant && net_cashflow.percent < 0.0 {
        OverallTrend::Declining
    } else {
        OverallTrend::Stable
    };

    let mut highlights = Vec::new();
    if income.significant {
        highlights.push(format!("Income changed {:.1}%", income.percent));
    }
    if expense.significant {
        highlights.push(format!("Expense changed {:.1}%", expense.percent));
    }
    if net_cashflow.significant {
        highlights.push(format!("Net cashflow changed {:.1}%", net_cashflow.percent));
    }

    let summary = match overall_trend {
        OverallTrend::Improving => "Net cashflow improved compared to the previous period".to_string(),
        OverallTrend::Declining => "Net cashflow declined compared to the previous period".to_string(),
        OverallTrend::Stable => "Net cashflow is stable compared to the previous period".to_string(),
    };

    PeriodComparison { income, expense, net_cashflow, transaction_count, overall_trend, summary, highlights }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TargetStatus {
    Above,
    OnTrack,
    Below,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetMetric {
    pub absolute: f64,
    pub percent: f64,
    pub status: TargetStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetComparison {
    pub income: TargetMetric,
    pub expense: TargetMetric,
    pub recommendations: Vec<String>,
}

/// `lower_is_better` flips the above/below sign convention for expense:
/// negative variance (spending under target) means "above" target
/// performance (spec §4.8: "for expense, lower is better").
fn target_metric(actual: f64, target: f64, lower_is_better: bool) -> TargetMetric {
    let absolute = actual - target;
    let percent = growth_rate_pct(target, actual);
    let status = if percent.abs() <= 5.0 {
        TargetStatus::OnTrack
    } else if (percent > 0.0) != lower_is_better {
        TargetStatus::Above
    } else {
        TargetStatus::Below
    };
    TargetMetric { absolute, percent, status }
}

pub fn target_comparison(actual_income: Money, target_income: Money, actual_expense: Money, target_expense: Money) -> TargetComparison {
    let income = target_metric(actual_income.to_f64(), target_income.to_f64(), false);
    let expense = target_metric(actual_expense.to_f64(), target_expense.to_f64(), true);

    let mut recommendations = Vec::new();
    if income.status == TargetStatus::Below {
        recommendations.push("Revenue is trailing the monthly target; review the sales pipeline".to_string());
    }
    if expense.status == TargetStatus::Above {
        recommendations.push("Spending is exceeding the monthly target; review discretionary categories".to_string());
    }
    if income.status == TargetStatus::Above && expense.status != TargetStatus::Above {
        recommendations.push("Revenue is ahead of target with spending under control; consider reinvestment".to_string());
    }

    TargetComparison { income, expense, recommendations }
}
