//! Property-based tests for EdgeGraph using proptest.
//!
//! Pagination must be invisible: for any data and any page size, a
//! traversal yields exactly the matching records, in index order, and a
//! walk split at any cursor yields the same sequence as one pass.

use proptest::prelude::*;

use edgegraph::catalog::{standard_indexes, IndexCatalog, EDGES_BY_GROUP, EDGES_BY_USER};
use edgegraph::pager::CursorPager;
use edgegraph::seed::EdgeWriter;
use edgegraph::store::SqliteStore;
use edgegraph::traversal::TraversalClient;
use edgegraph::types::{Collection, Edge, MatchKey, PageSize};

// ---------------------------------------------------------------------------
// Strategy helpers
// ---------------------------------------------------------------------------

/// Distinct edges over a small id space so users share groups.
fn arb_edges() -> impl Strategy<Value = Vec<Edge>> {
    prop::collection::btree_set((1i64..=6, 1i64..=8), 0..30).prop_flat_map(|pairs| {
        let edges: Vec<Edge> = pairs.into_iter().map(|(u, g)| Edge::new(u, g)).collect();
        Just(edges).prop_shuffle()
    })
}

fn arb_page_size() -> impl Strategy<Value = PageSize> {
    (1usize..=12).prop_map(|n| PageSize::new(n).unwrap())
}

fn store_with(edges: &[Edge]) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    let catalog = IndexCatalog::new(&store);
    catalog.ensure_collections(&Collection::ALL).unwrap();
    catalog.ensure_indexes(&standard_indexes()).unwrap();
    let writer = EdgeWriter::new(&store);
    for edge in edges {
        writer.create_edge(*edge).unwrap();
    }
    store
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Groups-for-user yields the user's edges in insertion order.
    #[test]
    fn traversal_is_complete_and_ordered(
        edges in arb_edges(),
        size in arb_page_size(),
        user in 1i64..=6,
    ) {
        let store = store_with(&edges);
        let expected: Vec<Edge> = edges.iter().copied().filter(|e| e.user_id == user).collect();

        let mut walk = TraversalClient::new(&store, size).groups_for_user(user);
        let got: Vec<Edge> = walk.by_ref().collect::<Result<_, _>>().unwrap();

        prop_assert_eq!(&got, &expected);
        // One page per `size` records, and always at least one.
        prop_assert_eq!(walk.pages_fetched(), expected.len().div_ceil(size.get()).max(1));
    }

    /// Users-for-group never leaks edges of other groups.
    #[test]
    fn traversal_is_exact(
        edges in arb_edges(),
        size in arb_page_size(),
        group in 1i64..=8,
    ) {
        let store = store_with(&edges);
        let got = TraversalClient::new(&store, size)
            .users_for_group(group)
            .collect_all()
            .unwrap();

        prop_assert!(got.iter().all(|e| e.group_id == group));
        prop_assert_eq!(
            got.len(),
            edges.iter().filter(|e| e.group_id == group).count()
        );
    }

    /// Resuming from any page's cursor yields the rest of a single pass.
    #[test]
    fn resumption_is_equivalent(
        edges in arb_edges(),
        size in arb_page_size(),
        user in 1i64..=6,
        split in 0usize..8,
    ) {
        let store = store_with(&edges);
        let client = TraversalClient::new(&store, size);
        let single = client.groups_for_user(user).collect_all().unwrap();

        let pager = CursorPager::new(&store);
        let mut pages = pager.pages(EDGES_BY_USER, MatchKey::from(user), size);
        let mut head: Vec<Edge> = Vec::new();
        for _ in 0..split {
            match pages.next() {
                Some(page) => head.extend(
                    page.unwrap()
                        .data
                        .into_iter()
                        .map(|v| serde_json::from_value::<Edge>(v).unwrap()),
                ),
                None => break,
            }
        }

        let tail = match pages.last_cursor().cloned() {
            Some(cursor) if split > 0 => client
                .resume::<Edge>(EDGES_BY_USER, user, cursor)
                .collect_all()
                .unwrap(),
            // Nothing consumed yet, or the walk already finished.
            _ if split == 0 => single.clone(),
            _ => Vec::new(),
        };

        prop_assert_eq!([head, tail].concat(), single);
    }

    /// Every page except the last is full, and only the last lacks a cursor.
    #[test]
    fn pages_are_full_until_the_last(
        edges in arb_edges(),
        size in arb_page_size(),
        group in 1i64..=8,
    ) {
        let store = store_with(&edges);
        let pages: Vec<_> = CursorPager::new(&store)
            .pages(EDGES_BY_GROUP, MatchKey::from(group), size)
            .collect::<Result<_, _>>()
            .unwrap();

        let (last, rest) = pages.split_last().unwrap();
        prop_assert!(last.after.is_none());
        for page in rest {
            prop_assert_eq!(page.data.len(), size.get());
            prop_assert!(page.after.is_some());
        }
        // No empty trailing page unless the whole match is empty.
        prop_assert!(!last.data.is_empty() || pages.len() == 1);
    }
}
