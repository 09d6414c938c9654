//! Cursor pager — walks an index match in bounded pages.
//!
//! Each request carries the cursor returned by the previous page; a page
//! without a cursor is the last one. Requests are strictly sequential
//! because the cursor for page N+1 only exists once page N has arrived.
//! The pager never retries: a failed fetch leaves the last good cursor in
//! place and hands the error to the caller.
//!
//! ```text
//! Start ──fetch──▶ HasMore ──fetch──▶ … ──fetch──▶ Done
//!   │                 │
//!   └──── error ──────┴──▶ Failed
//! ```

use std::iter::FusedIterator;

use serde_json::Value;

use crate::error::TraversalError;
use crate::store::{DocumentStore, Expr, Fetch, PaginateQuery};
use crate::types::{Cursor, MatchKey, Page, PageSize};

// ---------------------------------------------------------------------------
// CursorPager
// ---------------------------------------------------------------------------

/// Issues single page requests against one store handle.
pub struct CursorPager<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    fetch: Fetch,
}

// Manual impls: derive would require `S: Clone`.
impl<S: DocumentStore + ?Sized> Clone for CursorPager<'_, S> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<S: DocumentStore + ?Sized> Copy for CursorPager<'_, S> {}

impl<'a, S: DocumentStore + ?Sized> CursorPager<'a, S> {
    /// Pager whose entries are the matched documents' data objects.
    pub fn new(store: &'a S) -> Self {
        Self {
            store,
            fetch: Fetch::Data,
        }
    }

    /// Pager whose entries are document references instead of data.
    pub fn refs(store: &'a S) -> Self {
        Self {
            store,
            fetch: Fetch::Refs,
        }
    }

    /// First page of `index` matched on `key`.
    pub fn first_page(
        &self,
        index: &str,
        key: &MatchKey,
        size: PageSize,
    ) -> Result<Page<Value>, TraversalError> {
        self.fetch(index, key.terms(), size, None)
    }

    /// The page starting at `cursor`, as returned by an earlier page.
    pub fn next_page(
        &self,
        index: &str,
        key: &MatchKey,
        size: PageSize,
        cursor: &Cursor,
    ) -> Result<Page<Value>, TraversalError> {
        self.fetch(index, key.terms(), size, Some(cursor))
    }

    /// Lazy sequence of every page, from the beginning.
    pub fn pages(&self, index: &str, key: MatchKey, size: PageSize) -> Pages<'a, S> {
        Pages::new(*self, index, key, size, None)
    }

    /// Lazy sequence of pages starting at a previously obtained cursor.
    pub fn resume(
        &self,
        index: &str,
        key: MatchKey,
        size: PageSize,
        cursor: Cursor,
    ) -> Pages<'a, S> {
        Pages::new(*self, index, key, size, Some(cursor))
    }

    fn fetch(
        &self,
        index: &str,
        terms: &[Value],
        size: PageSize,
        after: Option<&Cursor>,
    ) -> Result<Page<Value>, TraversalError> {
        let expr = Expr::Paginate(PaginateQuery {
            index: index.to_string(),
            terms: terms.to_vec(),
            after: after.cloned(),
            size,
            fetch: self.fetch,
        });
        self.store
            .query(&expr)
            .and_then(|result| result.into_page())
            .map_err(|e| TraversalError::from_store(index, after.cloned(), e))
    }
}

// ---------------------------------------------------------------------------
// Pages
// ---------------------------------------------------------------------------

/// Where a [`Pages`] sequence stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    /// Nothing fetched yet.
    Start,
    /// The last page carried a cursor.
    HasMore,
    /// The last page carried no cursor. No further request is made.
    Done,
    /// A fetch failed. No further request is made; restart from
    /// [`Pages::last_cursor`] with [`CursorPager::resume`].
    Failed,
}

/// Fused iterator over the pages of one index match.
pub struct Pages<'a, S: DocumentStore + ?Sized> {
    pager: CursorPager<'a, S>,
    index: String,
    key: MatchKey,
    size: PageSize,
    state: PagerState,
    /// Resume point for the next request: the last cursor the store handed
    /// out, or the cursor this sequence was resumed from.
    cursor: Option<Cursor>,
    pages_fetched: usize,
}

impl<'a, S: DocumentStore + ?Sized> Pages<'a, S> {
    fn new(
        pager: CursorPager<'a, S>,
        index: &str,
        key: MatchKey,
        size: PageSize,
        cursor: Option<Cursor>,
    ) -> Self {
        Self {
            pager,
            index: index.to_string(),
            key,
            size,
            state: PagerState::Start,
            cursor,
            pages_fetched: 0,
        }
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    /// Last known-good cursor. After a failure this is where a fresh
    /// traversal should resume; after `Done` it is `None`.
    pub fn last_cursor(&self) -> Option<&Cursor> {
        self.cursor.as_ref()
    }

    pub fn pages_fetched(&self) -> usize {
        self.pages_fetched
    }

    pub fn index(&self) -> &str {
        &self.index
    }

    /// Stop the sequence after a failure detected by the consumer.
    pub(crate) fn fail(&mut self) {
        self.state = PagerState::Failed;
    }
}

impl<S: DocumentStore + ?Sized> Iterator for Pages<'_, S> {
    type Item = Result<Page<Value>, TraversalError>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.state {
            PagerState::Done | PagerState::Failed => return None,
            PagerState::Start | PagerState::HasMore => {}
        }

        let result = self.pager.fetch(
            &self.index,
            self.key.terms(),
            self.size,
            self.cursor.as_ref(),
        );

        match result {
            Ok(page) => {
                self.pages_fetched += 1;
                tracing::debug!(
                    index = %self.index,
                    page = self.pages_fetched,
                    entries = page.data.len(),
                    has_more = page.after.is_some(),
                    "fetched page"
                );
                self.state = if page.after.is_some() {
                    PagerState::HasMore
                } else {
                    PagerState::Done
                };
                self.cursor = page.after.clone();
                Some(Ok(page))
            }
            Err(e) => {
                tracing::warn!(
                    index = %self.index,
                    page = self.pages_fetched + 1,
                    error = %e,
                    "page fetch failed"
                );
                self.state = PagerState::Failed;
                Some(Err(e))
            }
        }
    }
}

impl<S: DocumentStore + ?Sized> FusedIterator for Pages<'_, S> {}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
