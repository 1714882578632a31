// =============================================================================
// Delivery Dispatcher
// =============================================================================
//
// Resolves a recommendation's target audience and drives delivery through
// the Notifier port, one recipient at a time (spec §5: "the Dispatcher
// ... processes users within a single recommendation serially"). Grounded on
// the teacher's `ExecutionEngine::execute_proposal` per-item attempt pattern
// (`execution.rs`): a risk/gate pre-check, then an outcome enum recorded per
// attempt rather than bailing out on the first failure.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::clock::Clock;
use crate::errors::{EngineError, EngineResult};
use crate::ledger::UserDirectory;
use crate::notifier::Notifier;
use crate::rate_limiter::RecipientRateLimiter;
use crate::recommendations::RecommendationStore;
use crate::render;
use crate::types::{RecommendationId, UserId};

/// Per-recipient delivery outcome, mirroring the teacher's `ExecutionResult`
/// shape: one variant per terminal state, each carrying its own detail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DeliveryOutcome {
    Delivered,
    SkippedDismissed,
    Throttled,
    Failed(String),
}

impl std::fmt::Display for DeliveryOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Delivered => write!(f, "delivered"),
            Self::SkippedDismissed => write!(f, "skipped-dismissed"),
            Self::Throttled => write!(f, "throttled"),
            Self::Failed(reason) => write!(f, "failed({reason})"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerUserResult {
    pub user_id: UserId,
    pub outcome: DeliveryOutcome,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub recommendation_id: RecommendationId,
    pub total_users: usize,
    pub delivered: usize,
    pub failed: usize,
    pub per_user_results: Vec<PerUserResult>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchResult {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
    pub results: Vec<DispatchResult>,
}

pub struct Dispatcher {
    pub users: Arc<dyn UserDirectory>,
    pub store: Arc<RecommendationStore>,
    pub notifier: Arc<dyn Notifier>,
    pub rate_limiter: Arc<RecipientRateLimiter>,
    pub clock: Arc<dyn Clock>,
    pub notifier_timeout: Duration,
}

impl Dispatcher {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        store: Arc<RecommendationStore>,
        notifier: Arc<dyn Notifier>,
        rate_limiter: Arc<RecipientRateLimiter>,
        clock: Arc<dyn Clock>,
        notifier_timeout: Duration,
    ) -> Self {
        Self { users, store, notifier, rate_limiter, clock, notifier_timeout }
    }

    /// Dispatches one recommendation to its full target audience. Recipients
    /// within the recommendation are processed sequentially, ordered by user
    /// id ascending (spec §5 ordering guarantee).
    pub async fn dispatch(&self, recommendation_id: RecommendationId) -> EngineResult<DispatchResult> {
        let recommendation = self
            .store
            .get_by_id(recommendation_id)
            .ok_or(EngineError::NotFound(recommendation_id))?;

        let mut audience = recommendation
            .target_roles
            .iter()
            .flat_map(|role| self.users.active_by_role(*role))
            .collect::<Vec<_>>();
        audience.sort_by_key(|u| u.id);
        audience.dedup_by_key(|u| u.id);

        let body = render::render(&recommendation);
        let mut per_user_results = Vec::with_capacity(audience.len());
        let mut delivered = 0usize;
        let mut failed = 0usize;

        for user in &audience {
            if self.store.is_dismissed_by(recommendation_id, user.id) {
                per_user_results.push(PerUserResult { user_id: user.id, outcome: DeliveryOutcome::SkippedDismissed });
                delivered += 1;
                continue;
            }

            if !self.rate_limiter.check(&user.contact) {
                per_user_results.push(PerUserResult { user_id: user.id, outcome: DeliveryOutcome::Throttled });
                failed += 1;
                continue;
            }

            let outcome = match tokio::time::timeout(self.notifier_timeout, self.notifier.send(&user.contact, &body)).await {
                Ok(Ok(())) => {
                    delivered += 1;
                    DeliveryOutcome::Delivered
                }
                Ok(Err(e)) => {
                    warn!(user_id = %user.id, error = %e, "notifier delivery failed");
                    failed += 1;
                    DeliveryOutcome::Failed(e.to_string())
                }
                Err(_) => {
                    warn!(user_id = %user.id, "notifier delivery timed out");
                    failed += 1;
                    DeliveryOutcome::Failed("notifier timeout".into())
                }
            };
            per_user_results.push(PerUserResult { user_id: user.id, outcome });
        }

        if delivered >= 1 {
            let _ = self.store.mark_acknowledged(recommendation_id, self.clock.now());
        }

        info!(
            id = %recommendation_id,
            total_users = audience.len(),
            delivered,
            failed,
            "dispatch cycle complete"
        );

        Ok(DispatchResult {
            recommendation_id,
            total_users: audience.len(),
            delivered,
            failed,
            per_user_results,
        })
    }

    /// Dispatches every recommendation still `pendingDelivery` within
    /// `max_age_minutes`, aggregating. Failures in one recommendation do not
    /// abort the batch.
    pub async fn deliver_pending(&self, max_age_minutes: i64) -> BatchResult {
        let now = self.clock.now();
        let pending = self.store.pending_delivery(max_age_minutes, now);
        let mut batch = BatchResult { attempted: pending.len(), ..Default::default() };

        for recommendation in pending {
            match self.dispatch(recommendation.id).await {
                Ok(result) => {
                    batch.delivered += result.delivered;
                    batch.failed += result.failed;
                    batch.results.push(result);
                }
                Err(e) => {
                    warn!(id = %recommendation.id, error = %e, "dispatch failed during pending delivery sweep");
                }
            }
        }

        batch
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLog;
    use crate::clock::FixedClock;
    use crate::detectors::{AnomalyCandidate, AnomalyPayload, NumericEvidence};
    use crate::ledger::{InMemoryUserDirectory, User};
    use crate::notifier::RecordingNotifier;
    use crate::types::{AnomalyKind, Priority, Role};
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn candidate() -> AnomalyCandidate {
        AnomalyCandidate {
            kind: AnomalyKind::ExpenseSpike,
            priority: Priority::Critical,
            confidence: 92,
            payload: AnomalyPayload {
                title: "t".into(),
                message: "m".into(),
                evidence: NumericEvidence { current: 1.0, baseline: 1.0, variance_pct: 1.0, threshold_pct: 1.0 },
                suggested_actions: vec!["a".into()],
                action_required: None,
                related_data: Default::default(),
            },
        }
    }

    fn dispatcher_with(
        users: Vec<User>,
        notifier: Arc<RecordingNotifier>,
    ) -> (Dispatcher, Arc<RecommendationStore>, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap(), chrono_tz::Asia::Makassar));
        let store = Arc::new(RecommendationStore::new(Arc::new(InMemoryAuditLog::new())));
        let directory: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new(users));
        let rate_limiter = Arc::new(RecipientRateLimiter::new(15, 15));
        let dispatcher = Dispatcher::new(
            directory,
            store.clone(),
            notifier,
            rate_limiter,
            clock.clone() as Arc<dyn Clock>,
            Duration::from_secs(10),
        );
        (dispatcher, store, clock)
    }

    #[tokio::test]
    async fn delivers_to_all_target_roles_and_acknowledges() {
        let boss = User { id: Uuid::from_u128(1), contact: "+1boss".into(), role: Role::Boss, active: true };
        let dev = User { id: Uuid::from_u128(2), contact: "+1dev".into(), role: Role::Dev, active: true };
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, store, clock) = dispatcher_with(vec![boss.clone(), dev.clone()], notifier.clone());
        let recommendation = store.create(candidate(), vec![Role::Boss, Role::Dev], clock.now());

        let result = dispatcher.dispatch(recommendation.id).await.unwrap();
        assert_eq!(result.total_users, 2);
        assert_eq!(result.delivered, 2);
        assert_eq!(result.failed, 0);
        assert_eq!(notifier.sent().len(), 2);
        assert!(store.get_by_id(recommendation.id).unwrap().acknowledged_at.is_some());
    }

    #[tokio::test]
    async fn dismissed_recipient_is_skipped_but_counted_delivered() {
        let boss = User { id: Uuid::from_u128(1), contact: "+1boss".into(), role: Role::Boss, active: true };
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, store, clock) = dispatcher_with(vec![boss.clone()], notifier.clone());
        let recommendation = store.create(candidate(), vec![Role::Boss], clock.now());
        store.dismiss_for_user(recommendation.id, boss.id).unwrap();

        let result = dispatcher.dispatch(recommendation.id).await.unwrap();
        assert_eq!(result.delivered, 1);
        assert!(matches!(result.per_user_results[0].outcome, DeliveryOutcome::SkippedDismissed));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn notifier_failure_is_recorded_without_aborting() {
        let boss = User { id: Uuid::from_u128(1), contact: "+1boss".into(), role: Role::Boss, active: true };
        let dev = User { id: Uuid::from_u128(2), contact: "+1dev".into(), role: Role::Dev, active: true };
        let notifier = Arc::new(RecordingNotifier::new());
        notifier.fail_for("+1boss");
        let (dispatcher, store, clock) = dispatcher_with(vec![boss.clone(), dev.clone()], notifier.clone());
        let recommendation = store.create(candidate(), vec![Role::Boss, Role::Dev], clock.now());

        let result = dispatcher.dispatch(recommendation.id).await.unwrap();
        assert_eq!(result.delivered, 1);
        assert_eq!(result.failed, 1);
    }

    #[tokio::test]
    async fn unknown_recommendation_is_not_found() {
        let notifier = Arc::new(RecordingNotifier::new());
        let (dispatcher, _store, _clock) = dispatcher_with(vec![], notifier);
        let result = dispatcher.dispatch(Uuid::new_v4()).await;
        assert!(matches!(result, Err(EngineError::NotFound(_))));
    }
}
