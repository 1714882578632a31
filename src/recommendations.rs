// =============================================================================
// Recommendation Store
// =============================================================================
//
// Persistence for recommendations with per-user dismissal set, acknowledge
// timestamp, and type-based recency queries. Mirrors the teacher's
// `PositionManager` open/closed split, generalized to the
// generated/delivered/acknowledged/closed state machine of spec §4.5.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::detectors::AnomalyCandidate;
use crate::errors::{EngineError, EngineResult};
use crate::types::{AnomalyKind, Priority, RecommendationId, Role, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recommendation {
    pub id: RecommendationId,
    pub kind: AnomalyKind,
    pub priority: Priority,
    pub confidence: u8,
    pub target_roles: Vec<Role>,
    pub payload: crate::detectors::AnomalyPayload,
    pub generated_at: DateTime<Utc>,
    pub dismissed_by_users: HashSet<UserId>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl Recommendation {
    fn from_candidate(candidate: AnomalyCandidate, target_roles: Vec<Role>, generated_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: candidate.kind,
            priority: candidate.priority,
            confidence: candidate.confidence,
            target_roles,
            payload: candidate.payload,
            generated_at,
            dismissed_by_users: HashSet::new(),
            acknowledged_at: None,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RecommendationStatistics {
    pub total: usize,
    pub by_priority: HashMap<Priority, usize>,
    pub by_kind: HashMap<AnomalyKind, usize>,
    pub average_confidence: f64,
}

pub struct RecommendationStore {
    rows: RwLock<HashMap<RecommendationId, Recommendation>>,
    audit: Arc<dyn AuditSink>,
}

impl RecommendationStore {
    pub fn new(audit: Arc<dyn AuditSink>) -> Self {
        Self { rows: RwLock::new(HashMap::new()), audit }
    }

    pub fn create(&self, candidate: AnomalyCandidate, target_roles: Vec<Role>, generated_at: DateTime<Utc>) -> Recommendation {
        let recommendation = Recommendation::from_candidate(candidate, target_roles, generated_at);
        self.rows.write().insert(recommendation.id, recommendation.clone());
        self.audit.record(AuditEvent::new(
            "recommendation_created",
            "orchestrator",
            recommendation.id,
            "recommendation",
            serde_json::json!({ "kind": recommendation.kind, "priority": recommendation.priority }),
        ));
        recommendation
    }

    pub fn get_by_id(&self, id: RecommendationId) -> Option<Recommendation> {
        self.rows.read().get(&id).cloned()
    }

    /// Ordered by (priority desc, confidence desc, generatedAt desc).
    pub fn recent_for_role(&self, role: Role, limit: usize, hours_back: i64, now: DateTime<Utc>) -> Vec<Recommendation> {
        let cutoff = now - chrono::Duration::hours(hours_back);
        let rows = self.rows.read();
        let mut matches: Vec<Recommendation> = rows
            .values()
            .filter(|r| r.target_roles.contains(&role))
            .filter(|r| r.generated_at >= cutoff)
            .cloned()
            .collect();
        matches.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then(b.confidence.cmp(&a.confidence))
                .then(b.generated_at.cmp(&a.generated_at))
        });
        matches.into_iter().take(limit).collect()
    }

    pub fn unacknowledged_critical(&self, role: Role) -> Vec<Recommendation> {
        let rows = self.rows.read();
        let mut matches: Vec<Recommendation> = rows
            .values()
            .filter(|r| r.target_roles.contains(&role))
            .filter(|r| r.priority == Priority::Critical)
            .filter(|r| r.acknowledged_at.is_none())
            .cloned()
            .collect();
        matches.sort_by(|a, b| b.generated_at.cmp(&a.generated_at));
        matches
    }

    /// Idempotent: sets `acknowledged_at` if nil, never unsets it once set.
    pub fn mark_acknowledged(&self, id: RecommendationId, at: DateTime<Utc>) -> EngineResult<Recommendation> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let transitioned = row.acknowledged_at.is_none();
        if transitioned {
            row.acknowledged_at = Some(at);
        }
        let result = row.clone();
        drop(rows);
        if transitioned {
            self.audit.record(AuditEvent::new("recommendation_acknowledged", "system", id, "recommendation", serde_json::json!({})));
        }
        Ok(result)
    }

    /// Idempotent set-insert; errors if `id` is unknown.
    pub fn dismiss_for_user(&self, id: RecommendationId, user_id: UserId) -> EngineResult<Recommendation> {
        let mut rows = self.rows.write();
        let row = rows.get_mut(&id).ok_or(EngineError::NotFound(id))?;
        let newly_dismissed = row.dismissed_by_users.insert(user_id);
        let result = row.clone();
        drop(rows);
        if newly_dismissed {
            self.audit.record(AuditEvent::new(
                "recommendation_dismissed",
                user_id.to_string(),
                id,
                "recommendation",
                serde_json::json!({}),
            ));
        }
        Ok(result)
    }

    pub fn is_dismissed_by(&self, id: RecommendationId, user_id: UserId) -> bool {
        self.rows
            .read()
            .get(&id)
            .map(|r| r.dismissed_by_users.contains(&user_id))
            .unwrap_or(false)
    }

    /// `recentForRole` filtered against `dismissedByUsers`; fetches 2x
    /// overage internally to account for filtered-out rows.
    pub fn active_for_user(&self, user_id: UserId, role: Role, limit: usize, now: DateTime<Utc>) -> Vec<Recommendation> {
        let overage = self.recent_for_role(role, limit * 2, 24 * 365, now);
        overage
            .into_iter()
            .filter(|r| !r.dismissed_by_users.contains(&user_id))
            .take(limit)
            .collect()
    }

    /// Used by gating: whether a recommendation of `kind` was persisted
    /// within the last `within_minutes`.
    pub fn has_recent(&self, kind: AnomalyKind, within_minutes: i64, now: DateTime<Utc>) -> bool {
        let cutoff = now - chrono::Duration::minutes(within_minutes);
        self.rows.read().values().any(|r| r.kind == kind && r.generated_at >= cutoff)
    }

    /// `generatedAt >= cutoff AND acknowledgedAt is nil`.
    pub fn pending_delivery(&self, within_minutes: i64, now: DateTime<Utc>) -> Vec<Recommendation> {
        let cutoff = now - chrono::Duration::minutes(within_minutes);
        self.rows
            .read()
            .values()
            .filter(|r| r.generated_at >= cutoff && r.acknowledged_at.is_none())
            .cloned()
            .collect()
    }

    pub fn cleanup_older_than(&self, days: i64, now: DateTime<Utc>) -> usize {
        let cutoff = now - chrono::Duration::days(days);
        let mut rows = self.rows.write();
        let purged: Vec<RecommendationId> = rows.values().filter(|r| r.generated_at < cutoff).map(|r| r.id).collect();
        rows.retain(|_, r| r.generated_at >= cutoff);
        drop(rows);
        for id in &purged {
            self.audit.record(AuditEvent::new("recommendation_purged", "system", *id, "recommendation", serde_json::json!({})));
        }
        purged.len()
    }

    pub fn statistics(&self, hours_back: i64, now: DateTime<Utc>) -> RecommendationStatistics {
        let cutoff = now - chrono::Duration::hours(hours_back);
        let rows = self.rows.read();
        let in_window: Vec<&Recommendation> = rows.values().filter(|r| r.generated_at >= cutoff).collect();

        let mut by_priority = HashMap::new();
        let mut by_kind = HashMap::new();
        let mut confidence_sum = 0u64;

        for r in &in_window {
            *by_priority.entry(r.priority).or_insert(0) += 1;
            *by_kind.entry(r.kind).or_insert(0) += 1;
            confidence_sum += r.confidence as u64;
        }

        let average_confidence = if in_window.is_empty() {
            0.0
        } else {
            confidence_sum as f64 / in_window.len() as f64
        };

        RecommendationStatistics {
            total: in_window.len(),
            by_priority,
            by_kind,
            average_confidence,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::InMemoryAuditLog;
    use crate::detectors::{AnomalyPayload, NumericEvidence};
    use chrono::TimeZone;

    fn store() -> RecommendationStore {
        RecommendationStore::new(Arc::new(InMemoryAuditLog::new()))
    }

    fn candidate(kind: AnomalyKind, priority: Priority, confidence: u8) -> AnomalyCandidate {
        AnomalyCandidate {
            kind,
            priority,
            confidence,
            payload: AnomalyPayload {
                title: "t".into(),
                message: "m".into(),
                evidence: NumericEvidence { current: 0.0, baseline: 0.0, variance_pct: 0.0, threshold_pct: 0.0 },
                suggested_actions: vec!["a".into()],
                action_required: None,
                related_data: Default::default(),
            },
        }
    }

    #[test]
    fn dismiss_is_idempotent() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap();
        let rec = store.create(candidate(AnomalyKind::ExpenseSpike, Priority::Critical, 90), vec![Role::Boss], now);
        let user = Uuid::new_v4();
        store.dismiss_for_user(rec.id, user).unwrap();
        store.dismiss_for_user(rec.id, user).unwrap();
        let row = store.get_by_id(rec.id).unwrap();
        assert_eq!(row.dismissed_by_users.len(), 1);
    }

    #[test]
    fn acknowledge_is_idempotent() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap();
        let rec = store.create(candidate(AnomalyKind::ExpenseSpike, Priority::Critical, 90), vec![Role::Boss], now);
        let first = store.mark_acknowledged(rec.id, now).unwrap();
        let second = store.mark_acknowledged(rec.id, now + chrono::Duration::minutes(5)).unwrap();
        assert_eq!(first.acknowledged_at, second.acknowledged_at);
    }

    #[test]
    fn scenario_d_dismissal_filtering() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap();
        let rec = store.create(candidate(AnomalyKind::ExpenseSpike, Priority::Critical, 90), vec![Role::Boss], now);
        let u1 = Uuid::new_v4();
        store.dismiss_for_user(rec.id, u1).unwrap();

        let active = store.active_for_user(u1, Role::Boss, 10, now);
        assert!(!active.iter().any(|r| r.id == rec.id));

        let recent = store.recent_for_role(Role::Boss, 10, 24, now);
        assert!(recent.iter().any(|r| r.id == rec.id));
    }

    #[test]
    fn has_recent_respects_window() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap();
        store.create(candidate(AnomalyKind::ExpenseSpike, Priority::Critical, 90), vec![Role::Boss], now - chrono::Duration::minutes(30));
        assert!(store.has_recent(AnomalyKind::ExpenseSpike, 60, now));
        assert!(!store.has_recent(AnomalyKind::ExpenseSpike, 10, now));
    }

    #[test]
    fn cleanup_removes_old_rows() {
        let store = store();
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 4, 0, 0).unwrap();
        store.create(candidate(AnomalyKind::ExpenseSpike, Priority::Critical, 90), vec![Role::Boss], now - chrono::Duration::days(100));
        store.create(candidate(AnomalyKind::ExpenseSpike, Priority::Critical, 90), vec![Role::Boss], now);
        let removed = store.cleanup_older_than(90, now);
        assert_eq!(removed, 1);
    }
}
