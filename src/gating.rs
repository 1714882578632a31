// =============================================================================
// Gating & Engine Orchestrator
// =============================================================================
//
// Runs detectors concurrently, applies gating rules (min confidence,
// priority floor, deduplication window), persists survivors. Mirrors the
// teacher's `RiskEngine` threshold-gate struct and `main.rs`'s
// `tokio::spawn` fan-out pattern.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::config::{DetectorThresholds, GatingPolicy};
use crate::detectors::cashflow::CashflowDetector;
use crate::detectors::expense_spike::ExpenseSpikeDetector;
use crate::detectors::revenue_decline::RevenueDeclineDetector;
use crate::detectors::target_variance::{MonthlyTarget, TargetVarianceDetector};
use crate::detectors::AnomalyCandidate;
use crate::ledger::LedgerStore;
use crate::recommendations::{Recommendation, RecommendationStore};
use crate::types::{AnomalyKind, RecommendationId};

/// Internal-only gating rejection reason; this signal never leaves the
/// Engine (spec §7: "Gated ... never leaves the Engine").
enum GateRejection {
    LowConfidence,
    BelowPriorityFloor,
    Duplicate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatedSummary {
    pub id: RecommendationId,
    pub kind: AnomalyKind,
    pub priority: crate::types::Priority,
    pub confidence: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleResult {
    pub detected: usize,
    pub gated: usize,
    pub created: usize,
    pub list: Vec<CreatedSummary>,
    pub partial: bool,
}

pub struct Orchestrator {
    pub ledger: Arc<dyn LedgerStore>,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<RecommendationStore>,
    pub policy: GatingPolicy,
    pub expense_spike: ExpenseSpikeDetector,
    pub revenue_decline: RevenueDeclineDetector,
    pub cashflow: CashflowDetector,
    pub target_variance: TargetVarianceDetector,
    pub cycle_deadline: StdDuration,
}

impl Orchestrator {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        clock: Arc<dyn Clock>,
        store: Arc<RecommendationStore>,
        policy: GatingPolicy,
        thresholds: DetectorThresholds,
        cycle_deadline: StdDuration,
    ) -> Self {
        Self {
            ledger,
            clock,
            store,
            policy,
            expense_spike: ExpenseSpikeDetector {
                threshold_pct: thresholds.expense_spike_threshold_pct,
                detector_prior: thresholds.detector_prior,
            },
            revenue_decline: RevenueDeclineDetector {
                threshold_pct: thresholds.revenue_decline_threshold_pct,
                detector_prior: thresholds.detector_prior,
            },
            cashflow: CashflowDetector {
                lookback_days: thresholds.cashflow_lookback_days,
                run_threshold: thresholds.cashflow_run_threshold,
                detector_prior: thresholds.detector_prior,
            },
            target_variance: TargetVarianceDetector {
                threshold_pct: thresholds.target_variance_threshold_pct,
                detector_prior: thresholds.detector_prior,
            },
            cycle_deadline,
        }
    }

    /// Runs one cycle: the three zero-arg detectors fan out concurrently,
    /// bounded by `cycle_deadline`. Target-variance is excluded from the
    /// automatic set (spec §4.6 step 1) and driven via `run_target_variance`.
    pub async fn run(&self) -> CycleResult {
        let ledger = self.ledger.clone();
        let clock = self.clock.clone();

        let deadline = tokio::time::timeout(self.cycle_deadline, async {
            let (expense, revenue, cashflow) = tokio::join!(
                run_detector(ledger.clone(), clock.clone(), |l, c| self.expense_spike.detect(l, c)),
                run_detector(ledger.clone(), clock.clone(), |l, c| self.revenue_decline.detect(l, c)),
                run_detector(ledger.clone(), clock.clone(), |l, c| self.cashflow.detect(l, c)),
            );
            vec![expense, revenue, cashflow].into_iter().flatten().collect::<Vec<_>>()
        })
        .await;

        let (candidates, partial) = match deadline {
            Ok(candidates) => (candidates, false),
            Err(_) => {
                warn!("cycle deadline exceeded; returning partial results");
                (Vec::new(), true)
            }
        };

        self.gate_and_persist(candidates, partial)
    }

    /// Driven separately because monthly targets are per-tenant and must be
    /// supplied by the caller (spec §9 open question).
    pub async fn run_target_variance(&self, target: &MonthlyTarget) -> CycleResult {
        let candidate = self.target_variance.detect(self.ledger.as_ref(), self.clock.as_ref(), target);
        self.gate_and_persist(candidate.into_iter().collect(), false)
    }

    fn gate_and_persist(&self, candidates: Vec<AnomalyCandidate>, partial: bool) -> CycleResult {
        let now = self.clock.now();
        let detected = candidates.len();
        let mut gated = 0usize;
        let mut created_list = Vec::new();

        for candidate in candidates {
            match self.apply_gates(&candidate, now) {
                Ok(()) => {
                    let roles = candidate.kind.target_roles().to_vec();
                    let recommendation: Recommendation = self.store.create(candidate, roles, now);
                    info!(
                        id = %recommendation.id,
                        kind = %recommendation.kind,
                        priority = %recommendation.priority,
                        confidence = recommendation.confidence,
                        "recommendation persisted"
                    );
                    created_list.push(CreatedSummary {
                        id: recommendation.id,
                        kind: recommendation.kind,
                        priority: recommendation.priority,
                        confidence: recommendation.confidence,
                    });
                }
                Err(_rejection) => {
                    gated += 1;
                }
            }
        }

        CycleResult {
            detected,
            gated,
            created: created_list.len(),
            list: created_list,
            partial,
        }
    }

    fn apply_gates(&self, candidate: &AnomalyCandidate, now: chrono::DateTime<Utc>) -> Result<(), GateRejection> {
        if candidate.confidence < self.policy.min_confidence_score {
            return Err(GateRejection::LowConfidence);
        }
        if self.policy.critical_priority_required && candidate.priority != crate::types::Priority::Critical {
            return Err(GateRejection::BelowPriorityFloor);
        }
        if self
            .store
            .has_recent(candidate.kind, self.policy.deduplication_window_minutes, now)
        {
            return Err(GateRejection::Duplicate);
        }
        Ok(())
    }
}

async fn run_detector<F>(
    ledger: Arc<dyn LedgerStore>,
    clock: Arc<dyn Clock>,
    detect: F,
) -> Option<AnomalyCandidate>
where
    F: FnOnce(&dyn LedgerStore, &dyn Clock) -> Option<AnomalyCandidate>,
{
    detect(ledger.as_ref(), clock.as_ref())
}
