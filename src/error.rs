//! Error types for EdgeGraph.
//!
//! Three layers, innermost first:
//! - [`StoreError`] — what the document store reports for a single query.
//! - [`TraversalError`] — what the pager and traversal client surface to
//!   their caller. Transient store failures carry the last good cursor.
//! - [`EdgeGraphError`] — crate-wide error for setup, writes, config and CLI.

use crate::types::Cursor;

// ---------------------------------------------------------------------------
// StoreError
// ---------------------------------------------------------------------------

/// Classified failure of a single store query.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The store could not be reached or its storage is unusable.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The caller is not allowed to perform the operation.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// A named collection, index or document does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The write would break a uniqueness constraint.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    /// The request timed out, was cancelled, or waited too long on a lock.
    #[error("timed out: {0}")]
    Timeout(String),

    /// The expression itself is malformed or conflicts with existing state.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl StoreError {
    /// Whether retrying the same request later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::Timeout(_))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ErrorCode;

        let msg = err.to_string();
        match err.sqlite_error_code() {
            Some(ErrorCode::DatabaseBusy)
            | Some(ErrorCode::DatabaseLocked)
            | Some(ErrorCode::OperationInterrupted) => Self::Timeout(msg),
            Some(ErrorCode::CannotOpen)
            | Some(ErrorCode::SystemIoFailure)
            | Some(ErrorCode::DiskFull)
            | Some(ErrorCode::DatabaseCorrupt)
            | Some(ErrorCode::NotADatabase)
            | Some(ErrorCode::OutOfMemory) => Self::Unavailable(msg),
            Some(ErrorCode::AuthorizationForStatementDenied)
            | Some(ErrorCode::PermissionDenied)
            | Some(ErrorCode::ReadOnly) => Self::Unauthorized(msg),
            Some(ErrorCode::ConstraintViolation) => Self::ConstraintViolation(msg),
            _ => Self::InvalidRequest(msg),
        }
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidRequest(format!("malformed document JSON: {err}"))
    }
}

// ---------------------------------------------------------------------------
// TraversalError
// ---------------------------------------------------------------------------

/// Failure of a paged read through an index.
#[derive(Debug, thiserror::Error)]
pub enum TraversalError {
    /// Transient failure talking to the store. `last_cursor` is the resume
    /// point for the page that failed (`None` means "from the start").
    #[error("store unavailable during traversal of '{index}': {source}")]
    StoreUnavailable {
        index: String,
        last_cursor: Option<Cursor>,
        #[source]
        source: StoreError,
    },

    /// The named index was never declared.
    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// The request does not fit the declared index, or the store rejected it
    /// for a reason only an operator can fix.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A page entry does not have the expected record shape.
    #[error("cannot decode entry {position} of page {page} from '{index}': {source}")]
    Decode {
        index: String,
        page: usize,
        position: usize,
        #[source]
        source: serde_json::Error,
    },
}

impl TraversalError {
    /// Map a store failure for `index`, attaching the cursor the failed
    /// request was issued with.
    pub fn from_store(index: &str, last_cursor: Option<Cursor>, err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(_) | StoreError::Timeout(_) => Self::StoreUnavailable {
                index: index.to_string(),
                last_cursor,
                source: err,
            },
            StoreError::NotFound(_) => Self::IndexNotFound(index.to_string()),
            StoreError::Unauthorized(msg) => {
                Self::Configuration(format!("not authorized to read '{index}': {msg}"))
            }
            StoreError::ConstraintViolation(msg) => Self::Configuration(format!(
                "unexpected constraint violation while reading '{index}': {msg}"
            )),
            StoreError::InvalidRequest(msg) => Self::Configuration(msg),
        }
    }

    /// The cursor to resume from, when the failure is resumable.
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        match self {
            Self::StoreUnavailable { last_cursor, .. } => last_cursor.as_ref(),
            _ => None,
        }
    }

    /// Whether a caller-level retry from [`Self::resume_cursor`] may succeed.
    pub fn is_resumable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

// ---------------------------------------------------------------------------
// EdgeGraphError
// ---------------------------------------------------------------------------

/// Crate-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum EdgeGraphError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Traversal(#[from] TraversalError),

    /// Index or store shape mismatch. Fatal: fix the declaration and redeploy.
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("index not found: {0}")]
    IndexNotFound(String),

    /// A duplicate (user_id, group_id) edge was rejected.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid config file: {0}")]
    Config(#[from] serde_yaml::Error),

    #[error("{0}")]
    Other(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, EdgeGraphError>;
