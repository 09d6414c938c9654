//! Document store interface.
//!
//! The traversal engine talks to its store through exactly one primitive,
//! [`DocumentStore::query`], fed with an [`Expr`]. Everything behind it —
//! transactions, expression evaluation, index maintenance — belongs to the
//! store. [`SqliteStore`] is the bundled implementation.

mod sqlite;

pub use sqlite::SqliteStore;

use serde_json::Value;

use crate::catalog::IndexSpec;
use crate::error::StoreError;
use crate::types::{Cursor, DocRef, Page, PageSize};

// ---------------------------------------------------------------------------
// Query expressions
// ---------------------------------------------------------------------------

/// What each entry of a paginated result carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Fetch {
    /// A [`DocRef`] per entry.
    Refs,
    /// The referenced document's data object per entry.
    #[default]
    Data,
}

/// Index match with an explicit page size and optional resume point.
#[derive(Debug, Clone, PartialEq)]
pub struct PaginateQuery {
    pub index: String,
    /// One scalar per declared index term.
    pub terms: Vec<Value>,
    pub after: Option<Cursor>,
    pub size: PageSize,
    pub fetch: Fetch,
}

/// A query expression understood by the store.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    CreateCollection { name: String },
    CreateIndex(IndexSpec),
    GetIndex { name: String },
    Create { collection: String, data: Value },
    Paginate(PaginateQuery),
}

/// Structured result of a query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult {
    /// `created` is false when the collection already existed.
    Collection { created: bool },
    Index(IndexSpec),
    Ref(DocRef),
    Page(Page<Value>),
}

impl QueryResult {
    /// Unwrap a page result.
    pub fn into_page(self) -> Result<Page<Value>, StoreError> {
        match self {
            Self::Page(page) => Ok(page),
            other => Err(StoreError::InvalidRequest(format!(
                "expected a page result, got {other:?}"
            ))),
        }
    }

    /// Unwrap a document reference.
    pub fn into_ref(self) -> Result<DocRef, StoreError> {
        match self {
            Self::Ref(r) => Ok(r),
            other => Err(StoreError::InvalidRequest(format!(
                "expected a document reference, got {other:?}"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// DocumentStore
// ---------------------------------------------------------------------------

/// A schemaless document store.
///
/// Implementations must be safe to share across threads: independent
/// traversals may run concurrently against one handle. Cancellation and
/// timeouts of an in-flight query are the implementation's job and surface
/// as [`StoreError::Timeout`].
pub trait DocumentStore: Send + Sync {
    fn query(&self, expr: &Expr) -> Result<QueryResult, StoreError>;
}
