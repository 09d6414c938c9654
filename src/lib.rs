//! EdgeGraph — paginated user/group membership traversal over a document
//! store.
//!
//! Users and groups are linked by edge documents. Two declared indexes
//! (`edges_by_user`, `edges_by_group`) answer "groups for a user" and "users
//! for a group"; the traversal client walks their results page by page with
//! opaque cursors and hands back decoded [`types::Edge`] records.

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod observability;
pub mod pager;
pub mod seed;
pub mod store;
pub mod traversal;
pub mod types;

pub use catalog::{IndexCatalog, IndexSpec};
pub use error::{EdgeGraphError, Result, StoreError, TraversalError};
pub use pager::{CursorPager, PagerState, Pages};
pub use seed::{seed_sample_data, EdgeWriter, SeedConfig, SeedReport};
pub use store::{DocumentStore, SqliteStore};
pub use traversal::{Traversal, TraversalClient};
pub use types::{Cursor, Edge, Group, MatchKey, Page, PageSize, User};
