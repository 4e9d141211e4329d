//! Error types for board operations.
//!
//! Every failure is per-operation and recoverable by retrying the gesture;
//! nothing here is fatal to the process.

use thiserror::Error;

use crate::models::CellKey;
use crate::view::ViewKind;

/// Crate result alias.
pub type Result<T, E = BoardError> = std::result::Result<T, E>;

/// Failure of the remote document store.
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Compare-and-swap write rejected: the stored document has moved on.
    #[error("version conflict on workspace {workspace_id}: expected {expected}, found {actual}")]
    VersionConflict {
        workspace_id: String,
        expected: u64,
        actual: u64,
    },

    /// The record addressed by a write does not exist.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The backend could not be reached.
    #[error("persistence unavailable: {0}")]
    Unavailable(String),

    /// A document could not be encoded or decoded.
    #[error("document codec error: {0}")]
    Codec(#[from] serde_json::Error),
}

/// Main error type for grid, view, and placement operations.
#[derive(Debug, Error)]
pub enum BoardError {
    /// Target span is already claimed by another task.
    #[error("cell {key} is occupied by task {occupant}, cannot place task {requested}")]
    CellConflict {
        key: CellKey,
        occupant: String,
        requested: String,
    },

    /// Remote read or write failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// Malformed input that breaks a data-model invariant.
    #[error("invariant violation: {0}")]
    InvariantViolation(String),

    #[error("task not found: {0}")]
    TaskNotFound(String),

    #[error("facility not found: {0}")]
    FacilityNotFound(String),

    /// Facility has no manpower, so no span can be computed.
    #[error("facility {0} has zero manpower")]
    ZeroManpower(String),

    /// Task duration must be at least one work-day.
    #[error("task {0} must have a positive duration")]
    ZeroDuration(String),

    /// Span is longer than the board accepts for one placement.
    #[error("task {task_id} would span {span} days, limit is {max}")]
    SpanTooLong {
        task_id: String,
        span: usize,
        max: usize,
    },

    /// Edits are only accepted while the day-granular view is selected.
    #[error("view {} is read-only", .0.name())]
    ReadOnlyView(ViewKind),

    #[error("configuration error: {0}")]
    Config(String),
}

impl BoardError {
    /// Whether retrying the same gesture may succeed without user changes.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Persistence(PersistenceError::VersionConflict { .. })
                | Self::Persistence(PersistenceError::Unavailable(_))
        )
    }
}
