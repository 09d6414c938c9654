//! Core domain types for EdgeGraph.
//!
//! Users and groups are plain integer-identified records; an [`Edge`] joins
//! one user to one group. Everything the store hands back through an index
//! page is raw JSON until the traversal client decodes it into one of these.

use std::fmt;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::error::{EdgeGraphError, Result};

// ---------------------------------------------------------------------------
// Collection
// ---------------------------------------------------------------------------

/// The three record kinds of the membership model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Users,
    Groups,
    Edges,
}

impl Collection {
    /// All collections, in creation order.
    pub const ALL: [Collection; 3] = [Self::Users, Self::Groups, Self::Edges];

    /// Collection name as stored.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Users => "users",
            Self::Groups => "groups",
            Self::Edges => "edges",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// A user. `id` is unique within the users collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
}

/// A group. `id` is unique within the groups collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Group {
    pub id: i64,
}

/// Membership of one user in one group.
///
/// The (user_id, group_id) pair is unique; the store enforces it through the
/// `edge_user_group` index, not this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Edge {
    pub user_id: i64,
    pub group_id: i64,
}

impl Edge {
    pub fn new(user_id: i64, group_id: i64) -> Self {
        Self { user_id, group_id }
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.user_id, self.group_id)
    }
}

// ---------------------------------------------------------------------------
// DocRef
// ---------------------------------------------------------------------------

/// Reference to a stored document: its collection plus store-assigned id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocRef {
    pub collection: String,
    pub id: i64,
}

// ---------------------------------------------------------------------------
// Cursor
// ---------------------------------------------------------------------------

/// Opaque resumption token produced by the store.
///
/// Never parsed or built by the pager or traversal client; it only travels
/// from one page response into the next page request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cursor(String);

impl Cursor {
    /// Wrap a token previously handed out by a store.
    pub fn from_token(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Cursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MatchKey
// ---------------------------------------------------------------------------

/// The term(s) an index is matched on: one scalar per declared index term.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchKey(Vec<serde_json::Value>);

impl MatchKey {
    /// Match on an index without terms (the whole source collection).
    pub fn all() -> Self {
        Self(Vec::new())
    }

    pub fn terms(&self) -> &[serde_json::Value] {
        &self.0
    }

    pub fn into_terms(self) -> Vec<serde_json::Value> {
        self.0
    }
}

impl From<i64> for MatchKey {
    fn from(v: i64) -> Self {
        Self(vec![v.into()])
    }
}

impl From<&str> for MatchKey {
    fn from(v: &str) -> Self {
        Self(vec![v.into()])
    }
}

impl From<(i64, i64)> for MatchKey {
    fn from((a, b): (i64, i64)) -> Self {
        Self(vec![a.into(), b.into()])
    }
}

impl From<Vec<serde_json::Value>> for MatchKey {
    fn from(terms: Vec<serde_json::Value>) -> Self {
        Self(terms)
    }
}

// ---------------------------------------------------------------------------
// PageSize
// ---------------------------------------------------------------------------

/// A validated, strictly positive page size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "usize", into = "usize")]
pub struct PageSize(NonZeroUsize);

impl PageSize {
    /// Default page size for membership walks.
    pub const DEFAULT: PageSize = PageSize(match NonZeroUsize::new(16) {
        Some(n) => n,
        None => unreachable!(),
    });

    /// Reject zero up front so the pager never sees it.
    pub fn new(size: usize) -> Result<Self> {
        NonZeroUsize::new(size)
            .map(Self)
            .ok_or_else(|| EdgeGraphError::Configuration("page size must be positive".into()))
    }

    pub fn get(&self) -> usize {
        self.0.get()
    }
}

impl Default for PageSize {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<usize> for PageSize {
    type Error = EdgeGraphError;

    fn try_from(size: usize) -> Result<Self> {
        Self::new(size)
    }
}

impl From<PageSize> for usize {
    fn from(size: PageSize) -> usize {
        size.get()
    }
}

impl fmt::Display for PageSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Page
// ---------------------------------------------------------------------------

/// One bounded batch of index results plus the cursor for the next batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    /// Absent on the last page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<Cursor>,
}

impl<T> Page<T> {
    /// Whether this is the final page of its traversal.
    pub fn is_last(&self) -> bool {
        self.after.is_none()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn page_size_rejects_zero() {
        assert!(matches!(
            PageSize::new(0),
            Err(EdgeGraphError::Configuration(_))
        ));
    }

    #[test_case(1 ; "one")]
    #[test_case(7 ; "seven")]
    #[test_case(16 ; "sixteen")]
    fn page_size_accepts_positive(n: usize) {
        assert_eq!(PageSize::new(n).unwrap().get(), n);
    }

    #[test]
    fn page_size_default_is_sixteen() {
        assert_eq!(PageSize::default().get(), 16);
    }

    #[test]
    fn page_size_deserialize_rejects_zero() {
        assert!(serde_json::from_str::<PageSize>("0").is_err());
        assert_eq!(serde_json::from_str::<PageSize>("5").unwrap().get(), 5);
    }

    #[test]
    fn edge_decodes_from_document_data() {
        let edge: Edge = serde_json::from_value(serde_json::json!({"user_id": 6, "group_id": 3}))
            .unwrap();
        assert_eq!(edge, Edge::new(6, 3));
    }

    #[test]
    fn edge_rejects_foreign_shape() {
        assert!(serde_json::from_value::<Edge>(serde_json::json!({"id": 6})).is_err());
        assert!(
            serde_json::from_value::<Edge>(serde_json::json!({"user_id": "6", "group_id": 3}))
                .is_err()
        );
    }

    #[test]
    fn cursor_is_transparent_in_json() {
        let c = Cursor::from_token("abc");
        assert_eq!(serde_json::to_string(&c).unwrap(), "\"abc\"");
    }

    #[test]
    fn page_is_last_without_cursor() {
        let page: Page<i64> = Page {
            data: vec![1, 2],
            after: None,
        };
        assert!(page.is_last());
        assert_eq!(page.len(), 2);
    }

    #[test]
    fn collection_names() {
        let names: Vec<_> = Collection::ALL.iter().map(|c| c.as_str()).collect();
        assert_eq!(names, ["users", "groups", "edges"]);
    }
}
