// =============================================================================
// Central Application State
// =============================================================================
//
// The single source of truth tying every subsystem together behind
// `Arc<AppState>`, mirroring the teacher's `AppState`: atomic counters for
// lock-free version tracking, `parking_lot::RwLock` for mutable collections,
// `Arc` wrappers for subsystems that manage their own interior mutability.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use crate::audit::{AuditSink, InMemoryAuditLog};
use crate::clock::{Clock, SystemClock};
use crate::config::EngineConfig;
use crate::dispatcher::Dispatcher;
use crate::gating::Orchestrator;
use crate::ledger::{InMemoryLedger, InMemoryUserDirectory, LedgerStore, UserDirectory};
use crate::notifier::Notifier;
use crate::rate_limiter::RecipientRateLimiter;
use crate::recommendations::RecommendationStore;
use crate::types::UserId;

/// Central application state shared across all async tasks via `Arc<AppState>`.
pub struct AppState {
    /// Monotonically increasing version counter, incremented on every
    /// completed engine cycle. Dashboards use this to detect new data
    /// without polling the full report surface.
    pub state_version: AtomicU64,

    pub config: RwLock<EngineConfig>,
    pub clock: Arc<dyn Clock>,
    pub ledger: Arc<dyn LedgerStore>,
    pub users: Arc<dyn UserDirectory>,
    pub recommendations: Arc<RecommendationStore>,
    pub audit: Arc<dyn AuditSink>,
    pub orchestrator: Arc<Orchestrator>,
    pub dispatcher: Arc<Dispatcher>,

    /// Bearer token → caller identity, for the authenticated query surface.
    /// This is the only process-global mutable state beyond the rate-limit
    /// bucket map and the Clock port (spec §5 shared-resource policy).
    tokens: RwLock<HashMap<String, UserId>>,
}

impl AppState {
    pub fn new(
        config: EngineConfig,
        ledger: Arc<dyn LedgerStore>,
        users: Arc<dyn UserDirectory>,
        notifier: Arc<dyn Notifier>,
        audit: Arc<dyn AuditSink>,
        tokens: HashMap<String, UserId>,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock::new(config.zone()));
        let recommendations = Arc::new(RecommendationStore::new(audit.clone()));

        let orchestrator = Arc::new(Orchestrator::new(
            ledger.clone(),
            clock.clone(),
            recommendations.clone(),
            config.gating_policy,
            config.detector_thresholds,
            Duration::from_secs(config.cycle_deadline_secs),
        ));

        let rate_limiter = Arc::new(RecipientRateLimiter::new(
            config.notifier_rate_limit_capacity,
            config.notifier_rate_limit_refill_per_minute,
        ));

        let dispatcher = Arc::new(Dispatcher::new(
            users.clone(),
            recommendations.clone(),
            notifier,
            rate_limiter,
            clock.clone(),
            Duration::from_secs(config.notifier_timeout_secs),
        ));

        Self {
            state_version: AtomicU64::new(0),
            config: RwLock::new(config),
            clock,
            ledger,
            users,
            recommendations,
            audit,
            orchestrator,
            dispatcher,
            tokens: RwLock::new(tokens),
        }
    }

    /// Convenience constructor wiring the in-memory reference implementations
    /// of every port, suitable for a standalone process without an external
    /// database.
    pub fn in_memory(config: EngineConfig, notifier: Arc<dyn Notifier>) -> Self {
        let audit: Arc<dyn AuditSink> = Arc::new(InMemoryAuditLog::new());
        let ledger: Arc<dyn LedgerStore> = Arc::new(InMemoryLedger::new(
            Vec::new(),
            config.description_max_len,
            config.duplicate_window_secs,
            audit.clone(),
        ));
        let users: Arc<dyn UserDirectory> = Arc::new(InMemoryUserDirectory::new(Vec::new()));
        Self::new(config, ledger, users, notifier, audit, HashMap::new())
    }

    pub fn current_state_version(&self) -> u64 {
        self.state_version.load(Ordering::Relaxed)
    }

    pub fn bump_state_version(&self) -> u64 {
        self.state_version.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn resolve_token(&self, token: &str) -> Option<UserId> {
        self.tokens.read().get(token).copied()
    }

    pub fn issue_token(&self, token: impl Into<String>, user_id: UserId) {
        self.tokens.write().insert(token.into(), user_id);
    }
}
