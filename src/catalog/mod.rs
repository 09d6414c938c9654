//! Index catalog — declares the secondary indexes the traversal engine reads.
//!
//! The membership model needs one index per traversal direction plus a
//! unique compound index that keeps each (user_id, group_id) pair to a
//! single edge. Declaration is idempotent; a conflicting redeclaration is a
//! configuration error and is never retried.

use serde::{Deserialize, Serialize};

use crate::error::{EdgeGraphError, Result, StoreError};
use crate::store::{DocumentStore, Expr, QueryResult};
use crate::types::Collection;

// ---------------------------------------------------------------------------
// Index names
// ---------------------------------------------------------------------------

pub const USERS_ALL: &str = "users_all";
pub const GROUPS_ALL: &str = "groups_all";
pub const EDGES_ALL: &str = "edges_all";
/// Edges keyed by `user_id` — "groups for a user".
pub const EDGES_BY_USER: &str = "edges_by_user";
/// Edges keyed by `group_id` — "users for a group".
pub const EDGES_BY_GROUP: &str = "edges_by_group";
/// Unique over (user_id, group_id); exists for write-time deduplication.
pub const EDGE_USER_GROUP: &str = "edge_user_group";

/// Leading segment of every indexable field path.
pub const DATA_SEGMENT: &str = "data";

// ---------------------------------------------------------------------------
// FieldPath
// ---------------------------------------------------------------------------

/// Ordered path of segments into a document, e.g. `["data", "user_id"]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldPath(Vec<String>);

impl FieldPath {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(segments.into_iter().map(Into::into).collect())
    }

    /// Path to a top-level field of the document's data.
    pub fn data(field: &str) -> Self {
        Self::new([DATA_SEGMENT, field])
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    /// SQLite JSON path for the part below `data`, e.g. `$.user_id`.
    pub fn json_path(&self) -> std::result::Result<String, String> {
        match self.0.split_first() {
            Some((head, rest)) if head == DATA_SEGMENT && !rest.is_empty() => {
                if let Some(bad) = rest.iter().find(|s| !is_identifier(s)) {
                    return Err(format!("invalid field path segment '{bad}' in {self}"));
                }
                Ok(format!("$.{}", rest.join(".")))
            }
            _ => Err(format!(
                "field path {self} must start with '{DATA_SEGMENT}' and name a field"
            )),
        }
    }
}

impl std::fmt::Display for FieldPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.0.join(", "))
    }
}

/// Whether `s` is usable verbatim as a SQL identifier fragment.
pub(crate) fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

// ---------------------------------------------------------------------------
// IndexSpec
// ---------------------------------------------------------------------------

/// Declaration of one secondary index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    pub name: String,
    /// Collection whose documents the index projects.
    pub source: String,
    /// Key fields, in order. Empty means the index lists the whole collection.
    #[serde(default)]
    pub terms: Vec<FieldPath>,
    #[serde(default)]
    pub unique: bool,
}

impl IndexSpec {
    /// Index over a whole collection, no terms.
    pub fn all(name: &str, source: Collection) -> Self {
        Self {
            name: name.to_string(),
            source: source.as_str().to_string(),
            terms: Vec::new(),
            unique: false,
        }
    }

    /// Non-unique index keyed on the given data fields.
    pub fn by(name: &str, source: Collection, fields: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            source: source.as_str().to_string(),
            terms: fields.iter().map(|f| FieldPath::data(f)).collect(),
            unique: false,
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Check names and paths; returns the JSON path of every term.
    pub fn validate(&self) -> std::result::Result<Vec<String>, String> {
        if !is_identifier(&self.name) {
            return Err(format!("invalid index name '{}'", self.name));
        }
        if !is_identifier(&self.source) {
            return Err(format!("invalid source collection '{}'", self.source));
        }
        if self.unique && self.terms.is_empty() {
            return Err(format!("unique index '{}' needs at least one term", self.name));
        }
        self.terms.iter().map(FieldPath::json_path).collect()
    }
}

/// Every index the membership model relies on.
pub fn standard_indexes() -> Vec<IndexSpec> {
    vec![
        IndexSpec::all(USERS_ALL, Collection::Users),
        IndexSpec::all(GROUPS_ALL, Collection::Groups),
        IndexSpec::all(EDGES_ALL, Collection::Edges),
        IndexSpec::by(EDGES_BY_USER, Collection::Edges, &["user_id"]),
        IndexSpec::by(EDGES_BY_GROUP, Collection::Edges, &["group_id"]),
        IndexSpec::by(EDGE_USER_GROUP, Collection::Edges, &["user_id", "group_id"]).unique(),
    ]
}

// ---------------------------------------------------------------------------
// IndexCatalog
// ---------------------------------------------------------------------------

/// Outcome of [`IndexCatalog::ensure_indexes`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnsureReport {
    pub created: Vec<String>,
    pub existing: Vec<String>,
}

/// Declares collections and indexes against a store handle.
pub struct IndexCatalog<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> IndexCatalog<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Create each collection that does not exist yet.
    pub fn ensure_collections(&self, collections: &[Collection]) -> Result<()> {
        for collection in collections {
            let result = self.store.query(&Expr::CreateCollection {
                name: collection.as_str().to_string(),
            })?;
            if let QueryResult::Collection { created: true } = result {
                tracing::info!(collection = collection.as_str(), "created collection");
            }
        }
        Ok(())
    }

    /// Create every index in `specs` that is absent.
    ///
    /// An index that already exists with the same definition is left as is.
    /// Any other failure aborts setup: shape mismatches need an operator.
    pub fn ensure_indexes(&self, specs: &[IndexSpec]) -> Result<EnsureReport> {
        let mut report = EnsureReport::default();

        for spec in specs {
            match self.lookup(&spec.name)? {
                Some(existing) if existing == *spec => {
                    tracing::debug!(index = %spec.name, "index already declared");
                    report.existing.push(spec.name.clone());
                }
                Some(existing) => {
                    return Err(EdgeGraphError::Configuration(format!(
                        "index '{}' already exists with an incompatible definition \
                         (source {}, terms {:?}, unique {}); wanted (source {}, terms {:?}, unique {})",
                        spec.name,
                        existing.source,
                        existing.terms,
                        existing.unique,
                        spec.source,
                        spec.terms,
                        spec.unique,
                    )));
                }
                None => {
                    self.store
                        .query(&Expr::CreateIndex(spec.clone()))
                        .map_err(|e| setup_error(&spec.name, e))?;
                    tracing::info!(
                        index = %spec.name,
                        source = %spec.source,
                        terms = spec.terms.len(),
                        unique = spec.unique,
                        "created index"
                    );
                    report.created.push(spec.name.clone());
                }
            }
        }

        Ok(report)
    }

    /// Stored definition of `name`.
    pub fn describe(&self, name: &str) -> Result<IndexSpec> {
        self.lookup(name)?
            .ok_or_else(|| EdgeGraphError::IndexNotFound(name.to_string()))
    }

    fn lookup(&self, name: &str) -> Result<Option<IndexSpec>> {
        match self.store.query(&Expr::GetIndex {
            name: name.to_string(),
        }) {
            Ok(QueryResult::Index(spec)) => Ok(Some(spec)),
            Ok(other) => Err(EdgeGraphError::Other(format!(
                "unexpected store result for index lookup: {other:?}"
            ))),
            Err(StoreError::NotFound(_)) => Ok(None),
            Err(e) => Err(setup_error(name, e)),
        }
    }
}

/// Index setup failures are fatal. Transient ones keep their store
/// classification so the operator can tell them apart.
fn setup_error(index: &str, err: StoreError) -> EdgeGraphError {
    match err {
        StoreError::Unavailable(_) | StoreError::Timeout(_) => EdgeGraphError::Store(err),
        other => EdgeGraphError::Configuration(format!("cannot declare index '{index}': {other}")),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
