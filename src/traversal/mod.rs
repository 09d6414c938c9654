//! Traversal client — follows one index match through all its pages and
//! yields decoded records.
//!
//! Pagination is hidden from the caller: a [`Traversal`] is a lazy iterator
//! of records that pulls the next page only when the current one has been
//! consumed. Each page is decoded in full before any of its records is
//! yielded, so a malformed entry never lets part of its page through.

use rayon::prelude::*;
use serde::de::DeserializeOwned;

use crate::catalog::{EDGES_BY_GROUP, EDGES_BY_USER};
use crate::error::TraversalError;
use crate::pager::{CursorPager, PagerState, Pages};
use crate::store::DocumentStore;
use crate::types::{Cursor, Edge, MatchKey, PageSize};

// ---------------------------------------------------------------------------
// TraversalClient
// ---------------------------------------------------------------------------

/// Starts traversals against one store handle with a fixed page size.
pub struct TraversalClient<'a, S: DocumentStore + ?Sized> {
    pager: CursorPager<'a, S>,
    page_size: PageSize,
}

impl<'a, S: DocumentStore + ?Sized> TraversalClient<'a, S> {
    pub fn new(store: &'a S, page_size: PageSize) -> Self {
        Self {
            pager: CursorPager::new(store),
            page_size,
        }
    }

    pub fn page_size(&self) -> PageSize {
        self.page_size
    }

    /// Every record of `index` matching `key`, decoded as `T`.
    ///
    /// Nothing is fetched until the returned iterator is polled.
    pub fn traverse<T: DeserializeOwned>(
        &self,
        index: &str,
        key: impl Into<MatchKey>,
    ) -> Traversal<'a, S, T> {
        Traversal::new(self.pager.pages(index, key.into(), self.page_size))
    }

    /// Continue a traversal from a cursor obtained earlier, typically from
    /// [`TraversalError::resume_cursor`].
    pub fn resume<T: DeserializeOwned>(
        &self,
        index: &str,
        key: impl Into<MatchKey>,
        cursor: Cursor,
    ) -> Traversal<'a, S, T> {
        Traversal::new(self.pager.resume(index, key.into(), self.page_size, cursor))
    }

    /// Membership edges of one user ("groups for user").
    pub fn groups_for_user(&self, user_id: i64) -> Traversal<'a, S, Edge> {
        self.traverse(EDGES_BY_USER, user_id)
    }

    /// Membership edges of one group ("users for group").
    pub fn users_for_group(&self, group_id: i64) -> Traversal<'a, S, Edge> {
        self.traverse(EDGES_BY_GROUP, group_id)
    }

    /// Run [`Self::groups_for_user`] for many users in parallel.
    ///
    /// Each traversal owns its own cursor; results come back in input order.
    pub fn groups_for_users(
        &self,
        user_ids: &[i64],
    ) -> Vec<(i64, Result<Vec<Edge>, TraversalError>)> {
        user_ids
            .par_iter()
            .map(|&user_id| (user_id, self.groups_for_user(user_id).collect_all()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Traversal
// ---------------------------------------------------------------------------

/// Lazy, finite, non-restartable sequence of decoded records.
pub struct Traversal<'a, S: DocumentStore + ?Sized, T> {
    pages: Pages<'a, S>,
    buffer: std::vec::IntoIter<T>,
}

impl<'a, S: DocumentStore + ?Sized, T: DeserializeOwned> Traversal<'a, S, T> {
    fn new(pages: Pages<'a, S>) -> Self {
        Self {
            pages,
            buffer: Vec::new().into_iter(),
        }
    }

    /// Drain the traversal into a vector, stopping at the first error.
    pub fn collect_all(self) -> Result<Vec<T>, TraversalError> {
        self.collect()
    }

    /// Pages fetched so far.
    pub fn pages_fetched(&self) -> usize {
        self.pages.pages_fetched()
    }

    /// Resume point of the underlying page sequence.
    pub fn last_cursor(&self) -> Option<&Cursor> {
        self.pages.last_cursor()
    }

    pub fn state(&self) -> PagerState {
        self.pages.state()
    }

    fn decode(&self, entries: Vec<serde_json::Value>) -> Result<Vec<T>, TraversalError> {
        entries
            .into_iter()
            .enumerate()
            .map(|(position, entry)| {
                serde_json::from_value(entry).map_err(|source| TraversalError::Decode {
                    index: self.pages.index().to_string(),
                    page: self.pages.pages_fetched(),
                    position,
                    source,
                })
            })
            .collect()
    }
}

impl<S: DocumentStore + ?Sized, T: DeserializeOwned> Iterator for Traversal<'_, S, T> {
    type Item = Result<T, TraversalError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.buffer.next() {
                return Some(Ok(record));
            }

            let page = match self.pages.next()? {
                Ok(page) => page,
                Err(e) => return Some(Err(e)),
            };

            match self.decode(page.data) {
                Ok(records) => self.buffer = records.into_iter(),
                Err(e) => {
                    tracing::error!(error = %e, "schema drift in index page");
                    self.pages.fail();
                    return Some(Err(e));
                }
            }
        }
    }
}

impl<S: DocumentStore + ?Sized, T: DeserializeOwned> std::iter::FusedIterator
    for Traversal<'_, S, T>
{
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
