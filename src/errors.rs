// =============================================================================
// Typed error taxonomy
// =============================================================================
//
// `Gated` is deliberately not a variant here — it is an internal signal
// inside the orchestrator and never leaves the Engine.

use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(Uuid),

    #[error("version conflict on {id}: expected {expected}, found {found}")]
    VersionConflict { id: Uuid, expected: u64, found: u64 },

    #[error("concurrent modification on {0} after exhausting retries")]
    ConcurrentModification(Uuid),

    #[error("duplicate transaction: owner={owner} category={category} amount={amount}")]
    DuplicateTransaction {
        owner: Uuid,
        category: String,
        amount: String,
    },

    #[error("edit forbidden: {0}")]
    EditForbidden(String),

    #[error("rate limit exceeded for {0}")]
    Throttled(String),

    #[error("notifier transport error: {0}")]
    TransportError(String),

    #[error("cycle deadline exceeded; partial results returned")]
    PartialCycle,

    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
