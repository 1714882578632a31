// =============================================================================
// Audit event stream
// =============================================================================
//
// Every state change emits an audit event with {action, actor, target,
// entityType, detailsJSON, timestamp}. Delivery failures are not fatal for
// audit; audit emission errors are logged and discarded.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub action: String,
    pub actor: String,
    pub target: Uuid,
    pub entity_type: String,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl AuditEvent {
    pub fn new(
        action: impl Into<String>,
        actor: impl Into<String>,
        target: Uuid,
        entity_type: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        Self {
            action: action.into(),
            actor: actor.into(),
            target,
            entity_type: entity_type.into(),
            details,
            timestamp: Utc::now(),
        }
    }
}

/// A sink the engine emits audit events through. Storage mechanics are out
/// of scope (spec §1 non-goals); this crate ships only the event contract
/// and an in-memory ring buffer suitable for the dashboard and for tests.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: AuditEvent);
}

/// Maximum number of recent audit events to retain.
const MAX_RECENT_AUDIT_EVENTS: usize = 500;

/// Bounded in-memory audit log, mirroring the ring-buffer eviction used for
/// the error log in the teacher's central state struct.
pub struct InMemoryAuditLog {
    events: parking_lot::RwLock<Vec<AuditEvent>>,
}

impl InMemoryAuditLog {
    pub fn new() -> Self {
        Self {
            events: parking_lot::RwLock::new(Vec::new()),
        }
    }

    pub fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let events = self.events.read();
        events.iter().rev().take(limit).cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for InMemoryAuditLog {
    fn default() -> Self {
        Self::new()
    }
}

impl AuditSink for InMemoryAuditLog {
    fn record(&self, event: AuditEvent) {
        let mut events = self.events.write();
        events.push(event);
        while events.len() > MAX_RECENT_AUDIT_EVENTS {
            events.remove(0);
        }
    }
}
