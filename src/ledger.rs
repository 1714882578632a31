// =============================================================================
// Ledger Query Layer
// =============================================================================
//
// Read/write contract over transactions: day-range aggregations, paginated
// reads, optimistic-locked updates, soft delete. Backed by an in-memory
// RwLock-guarded store, mirroring the teacher's position/risk state pattern
// generalized to the versioned-mutation contract this module needs.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditSink};
use crate::clock::Clock;
use crate::errors::{EngineError, EngineResult};
use crate::money::Money;
use crate::types::{ApprovalStatus, Kind, Role, TransactionId, UserId};

/// Prefix applied to a soft-deleted transaction's description.
const DELETION_MARKER: &str = "[DELETED";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub owner_id: UserId,
    pub kind: Kind,
    pub category: String,
    pub amount: Money,
    pub description: Option<String>,
    pub event_timestamp: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<UserId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub version: u64,
    pub archived_at: Option<DateTime<Utc>>,
}

impl Transaction {
    pub fn is_approved(&self) -> bool {
        self.approval_status == ApprovalStatus::Approved
    }
}

#[derive(Debug, Clone)]
pub struct CategoryEntry {
    pub name: String,
    pub kind: Kind,
    pub active: bool,
}

#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub contact: String,
    pub role: Role,
    pub active: bool,
}

/// Aggregate statistics for one calendar day in the operating timezone.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct DailyBucket {
    pub date: NaiveDate,
    pub total_income: Money,
    pub total_expense: Money,
    pub net_cashflow: Money,
    pub transaction_count: u32,
}

impl DailyBucket {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_income: Money::ZERO,
            total_expense: Money::ZERO,
            net_cashflow: Money::ZERO,
            transaction_count: 0,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct OwnerQuery {
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
    pub kind: Option<Kind>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Fields accepted by a creation call.
#[derive(Debug, Clone)]
pub struct NewTransaction {
    pub owner_id: UserId,
    pub kind: Kind,
    pub category: String,
    pub amount: Money,
    pub description: Option<String>,
    pub approval_status: ApprovalStatus,
    pub approved_by: Option<UserId>,
    pub event_timestamp: DateTime<Utc>,
}

/// Fields accepted by a version-guarded update.
#[derive(Debug, Clone, Default)]
pub struct TransactionPatch {
    pub category: Option<String>,
    pub amount: Option<Money>,
    pub description: Option<Option<String>>,
    pub approval_status: Option<ApprovalStatus>,
    pub approved_by: Option<Option<UserId>>,
    pub approved_at: Option<Option<DateTime<Utc>>>,
}

pub trait LedgerStore: Send + Sync {
    fn find_by_id(&self, id: TransactionId) -> Option<Transaction>;
    fn find_by_owner(&self, owner_id: UserId, query: OwnerQuery) -> Vec<Transaction>;
    /// Unscoped read across all owners, for boss/dev full-visibility queries
    /// (spec §4.9: "boss, dev: full visibility within the requested range").
    fn find_all(&self, query: OwnerQuery) -> Vec<Transaction>;
    fn day_buckets_for_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        owner_id: Option<UserId>,
        clock: &dyn Clock,
    ) -> Vec<DailyBucket>;
    fn sum_over(
        &self,
        kind: Kind,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
        owner_id: Option<UserId>,
    ) -> Money;
    fn create(&self, new: NewTransaction, clock: &dyn Clock, max_amount: Money) -> EngineResult<Transaction>;
    fn update_with_version(
        &self,
        id: TransactionId,
        expected_version: u64,
        patch: TransactionPatch,
    ) -> EngineResult<Transaction>;
    fn soft_delete(&self, id: TransactionId, actor: &str, reason: Option<&str>) -> EngineResult<Transaction>;
    fn category(&self, name: &str) -> Option<CategoryEntry>;
}

/// In-memory ledger store. A SQL-backed `LedgerStore` implementation (per
/// the table definitions in spec §6) can be swapped in behind this trait
/// without touching detectors or the orchestrator.
pub struct InMemoryLedger {
    transactions: RwLock<HashMap<TransactionId, Transaction>>,
    categories: RwLock<HashMap<String, CategoryEntry>>,
    description_max_len: usize,
    duplicate_window_secs: i64,
    audit: Arc<dyn AuditSink>,
}

impl InMemoryLedger {
    pub fn new(categories: Vec<CategoryEntry>, description_max_len: usize, duplicate_window_secs: i64, audit: Arc<dyn AuditSink>) -> Self {
        let mut map = HashMap::new();
        for c in categories {
            map.insert(c.name.clone(), c);
        }
        Self {
            transactions: RwLock::new(HashMap::new()),
            categories: RwLock::new(map),
            description_max_len,
            duplicate_window_secs,
            audit,
        }
    }

    fn validate(&self, kind: Kind, category: &str, amount: Money, description: &Option<String>, max_amount: Money) -> EngineResult<()> {
        if !amount.is_positive() {
            return Err(EngineError::Validation("amount must be strictly positive".into()));
        }
        if amount > max_amount {
            return Err(EngineError::Validation(format!("amount exceeds configured maximum of {max_amount}")));
        }
        let categories = self.categories.read();
        let entry = categories
            .get(category)
            .ok_or_else(|| EngineError::Validation(format!("unknown category '{category}'")))?;
        if !entry.active {
            return Err(EngineError::Validation(format!("category '{category}' is not active")));
        }
        if entry.kind != kind {
            return Err(EngineError::Validation(format!(
                "category '{category}' is kind {} but transaction is kind {kind}",
                entry.kind
            )));
        }
        if let Some(desc) = description {
            if desc.chars().count() > self.description_max_len {
                return Err(EngineError::Validation(format!(
                    "description exceeds {} characters",
                    self.description_max_len
                )));
            }
            if desc.chars().any(|c| c.is_control()) {
                return Err(EngineError::Validation("description may not contain control bytes".into()));
            }
        }
        Ok(())
    }

    fn is_duplicate(&self, owner_id: UserId, category: &str, amount: Money, created_at: DateTime<Utc>) -> bool {
        if self.duplicate_window_secs <= 0 {
            return false;
        }
        let cutoff = created_at - chrono::Duration::seconds(self.duplicate_window_secs);
        let transactions = self.transactions.read();
        transactions.values().any(|t| {
            t.owner_id == owner_id
                && t.category == category
                && t.amount == amount
                && t.created_at >= cutoff
                && t.created_at <= created_at
        })
    }

    /// Raw version-guarded mutation with no audit emission of its own —
    /// `soft_delete` drives this directly so the two public mutation paths
    /// each produce exactly one audit event instead of two.
    fn apply_patch(&self, id: TransactionId, expected_version: u64, patch: TransactionPatch) -> EngineResult<Transaction> {
        let mut transactions = self.transactions.write();
        let current = transactions.get(&id).ok_or(EngineError::NotFound(id))?;
        if current.version != expected_version {
            return Err(EngineError::VersionConflict {
                id,
                expected: expected_version,
                found: current.version,
            });
        }

        let mut updated = current.clone();
        if let Some(category) = patch.category {
            updated.category = category;
        }
        if let Some(amount) = patch.amount {
            updated.amount = amount;
        }
        if let Some(description) = patch.description {
            updated.description = description;
        }
        if let Some(approval_status) = patch.approval_status {
            updated.approval_status = approval_status;
        }
        if let Some(approved_by) = patch.approved_by {
            updated.approved_by = approved_by;
        }
        if let Some(approved_at) = patch.approved_at {
            updated.approved_at = approved_at;
        }
        updated.version += 1;

        transactions.insert(id, updated.clone());
        Ok(updated)
    }
}

impl LedgerStore for InMemoryLedger {
    fn find_by_id(&self, id: TransactionId) -> Option<Transaction> {
        self.transactions.read().get(&id).cloned()
    }

    fn find_by_owner(&self, owner_id: UserId, query: OwnerQuery) -> Vec<Transaction> {
        let transactions = self.transactions.read();
        let mut rows: Vec<Transaction> = transactions
            .values()
            .filter(|t| t.owner_id == owner_id)
            .filter(|t| query.from.map_or(true, |from| t.event_timestamp >= from))
            .filter(|t| query.to.map_or(true, |to| t.event_timestamp <= to))
            .filter(|t| query.kind.map_or(true, |k| t.kind == k))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.event_timestamp.cmp(&a.event_timestamp));
        let offset = query.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    fn find_all(&self, query: OwnerQuery) -> Vec<Transaction> {
        let transactions = self.transactions.read();
        let mut rows: Vec<Transaction> = transactions
            .values()
            .filter(|t| query.from.map_or(true, |from| t.event_timestamp >= from))
            .filter(|t| query.to.map_or(true, |to| t.event_timestamp <= to))
            .filter(|t| query.kind.map_or(true, |k| t.kind == k))
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.event_timestamp.cmp(&a.event_timestamp));
        let offset = query.offset.unwrap_or(0);
        let rows = rows.into_iter().skip(offset);
        match query.limit {
            Some(limit) => rows.take(limit).collect(),
            None => rows.collect(),
        }
    }

    fn day_buckets_for_range(
        &self,
        from: NaiveDate,
        to: NaiveDate,
        owner_id: Option<UserId>,
        clock: &dyn Clock,
    ) -> Vec<DailyBucket> {
        let transactions = self.transactions.read();
        let mut buckets: HashMap<NaiveDate, DailyBucket> = HashMap::new();
        let mut date = from;
        while date <= to {
            buckets.insert(date, DailyBucket::empty(date));
            date = date.succ_opt().expect("date does not overflow range");
        }

        for t in transactions.values() {
            if !t.is_approved() {
                continue;
            }
            if let Some(owner) = owner_id {
                if t.owner_id != owner {
                    continue;
                }
            }
            let local_date = t.event_timestamp.with_timezone(&clock.zone()).date_naive();
            if let Some(bucket) = buckets.get_mut(&local_date) {
                match t.kind {
                    Kind::Income => bucket.total_income += t.amount,
                    Kind::Expense => bucket.total_expense += t.amount,
                }
                bucket.transaction_count += 1;
            }
        }

        for bucket in buckets.values_mut() {
            bucket.net_cashflow = bucket.total_income - bucket.total_expense;
        }

        let mut out: Vec<DailyBucket> = buckets.into_values().collect();
        out.sort_by_key(|b| b.date);
        out
    }

    fn sum_over(&self, kind: Kind, from: DateTime<Utc>, to: DateTime<Utc>, owner_id: Option<UserId>) -> Money {
        let transactions = self.transactions.read();
        transactions
            .values()
            .filter(|t| t.is_approved())
            .filter(|t| t.kind == kind)
            .filter(|t| t.event_timestamp >= from && t.event_timestamp <= to)
            .filter(|t| owner_id.map_or(true, |owner| t.owner_id == owner))
            .map(|t| t.amount)
            .sum()
    }

    fn create(&self, new: NewTransaction, clock: &dyn Clock, max_amount: Money) -> EngineResult<Transaction> {
        self.validate(new.kind, &new.category, new.amount, &new.description, max_amount)?;

        let created_at = clock.now();
        if self.is_duplicate(new.owner_id, &new.category, new.amount, created_at) {
            return Err(EngineError::DuplicateTransaction {
                owner: new.owner_id,
                category: new.category,
                amount: new.amount.to_string(),
            });
        }

        let transaction = Transaction {
            id: Uuid::new_v4(),
            owner_id: new.owner_id,
            kind: new.kind,
            category: new.category,
            amount: new.amount,
            description: new.description,
            event_timestamp: new.event_timestamp,
            created_at,
            approval_status: new.approval_status,
            approved_by: new.approved_by,
            approved_at: if new.approval_status == ApprovalStatus::Approved {
                Some(created_at)
            } else {
                None
            },
            version: 1,
            archived_at: None,
        };

        self.transactions.write().insert(transaction.id, transaction.clone());
        self.audit.record(AuditEvent::new(
            "transaction_created",
            transaction.owner_id.to_string(),
            transaction.id,
            "transaction",
            serde_json::json!({ "kind": transaction.kind, "category": transaction.category, "amount": transaction.amount.to_string() }),
        ));
        Ok(transaction)
    }

    fn update_with_version(
        &self,
        id: TransactionId,
        expected_version: u64,
        patch: TransactionPatch,
    ) -> EngineResult<Transaction> {
        let updated = self.apply_patch(id, expected_version, patch)?;
        self.audit.record(AuditEvent::new(
            "transaction_updated",
            "system",
            updated.id,
            "transaction",
            serde_json::json!({ "version": updated.version }),
        ));
        Ok(updated)
    }

    fn soft_delete(&self, id: TransactionId, actor: &str, reason: Option<&str>) -> EngineResult<Transaction> {
        let current = self.find_by_id(id).ok_or(EngineError::NotFound(id))?;
        let marker = match reason {
            Some(r) => format!("{DELETION_MARKER} by {actor}: {r}] "),
            None => format!("{DELETION_MARKER} by {actor}] "),
        };
        let new_description = format!("{marker}{}", current.description.clone().unwrap_or_default());
        let updated = self.apply_patch(
            id,
            current.version,
            TransactionPatch {
                amount: Some(Money::ZERO),
                description: Some(Some(new_description)),
                ..Default::default()
            },
        )?;
        self.audit.record(AuditEvent::new(
            "transaction_deleted",
            actor,
            updated.id,
            "transaction",
            serde_json::json!({ "reason": reason }),
        ));
        Ok(updated)
    }

    fn category(&self, name: &str) -> Option<CategoryEntry> {
        self.categories.read().get(name).cloned()
    }
}

/// Directory of users for audience resolution (spec §6 `users` table). Kept
/// separate from `LedgerStore` since transaction/category concerns and
/// identity concerns have independent lifecycles.
pub trait UserDirectory: Send + Sync {
    fn find_by_id(&self, id: UserId) -> Option<User>;
    fn active_by_role(&self, role: Role) -> Vec<User>;
}

pub struct InMemoryUserDirectory {
    users: RwLock<HashMap<UserId, User>>,
}

impl InMemoryUserDirectory {
    pub fn new(users: Vec<User>) -> Self {
        let map = users.into_iter().map(|u| (u.id, u)).collect();
        Self { users: RwLock::new(map) }
    }
}

impl UserDirectory for InMemoryUserDirectory {
    fn find_by_id(&self, id: UserId) -> Option<User> {
        self.users.read().get(&id).cloned()
    }

    /// Sorted by user id ascending (spec §5: "per-user delivery attempts are
    /// ordered by user identifier ascending").
    fn active_by_role(&self, role: Role) -> Vec<User> {
        let mut rows: Vec<User> = self.users.read().values().filter(|u| u.active && u.role == role).cloned().collect();
        rows.sort_by_key(|u| u.id);
        rows
    }
}

/// Retries `update_with_version` up to `max_attempts` times on
/// `VersionConflict`, with exponential backoff (100ms, 200ms, 400ms, capped
/// at 1s). `build_patch` is re-invoked against the freshly-read transaction
/// on every attempt so callers can compute a patch relative to current
/// state.
pub async fn update_with_retry(
    store: &Arc<dyn LedgerStore>,
    id: TransactionId,
    max_attempts: u32,
    mut build_patch: impl FnMut(&Transaction) -> TransactionPatch,
) -> EngineResult<Transaction> {
    let mut attempt = 0;
    let mut backoff_ms: u64 = 100;
    loop {
        let current = store.find_by_id(id).ok_or(EngineError::NotFound(id))?;
        let patch = build_patch(&current);
        match store.update_with_version(id, current.version, patch) {
            Ok(updated) => return Ok(updated),
            Err(EngineError::VersionConflict { .. }) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(EngineError::ConcurrentModification(id));
                }
                tokio::time::sleep(std::time::Duration::from_millis(backoff_ms)).await;
                backoff_ms = (backoff_ms * 2).min(1000);
            }
            Err(other) => return Err(other),
        }
    }
}

/// Edit-permission table (spec §4.2.3). `is_owner` is whether the caller is
/// the transaction's owner; `days_diff` is
/// `floor((now - transaction.eventTimestamp) / 24h)` in the operating zone.
pub fn check_edit_permission(role: Role, is_owner: bool, days_diff: i64) -> EngineResult<()> {
    if is_owner {
        return if days_diff == 0 {
            Ok(())
        } else {
            Err(EngineError::EditForbidden(
                "owner edits are only permitted on the day the transaction occurred".into(),
            ))
        };
    }

    match role {
        Role::Dev => Ok(()),
        Role::Boss => {
            if days_diff <= 7 {
                Ok(())
            } else {
                Err(EngineError::EditForbidden(
                    "boss edits are only permitted within 7 days of the transaction".into(),
                ))
            }
        }
        Role::Employee | Role::Investor => Err(EngineError::EditForbidden(
            "non-owner edits require boss or dev role".into(),
        )),
    }
}
