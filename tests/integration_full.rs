//! End-to-end tests for EdgeGraph.
//!
//! These seed a real SQLite store, walk the membership indexes through the
//! traversal client, and check the results against a full scan.

use std::sync::Arc;
use std::thread;

use pretty_assertions::assert_eq;
use tempfile::TempDir;

use edgegraph::catalog::{standard_indexes, IndexCatalog, EDGES_ALL, EDGES_BY_USER};
use edgegraph::config::EdgeGraphConfig;
use edgegraph::error::{EdgeGraphError, TraversalError};
use edgegraph::seed::{seed_sample_data, EdgeWriter, SeedConfig};
use edgegraph::store::SqliteStore;
use edgegraph::traversal::TraversalClient;
use edgegraph::types::{Collection, Edge, MatchKey, PageSize};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn sample_config(rng_seed: u64) -> SeedConfig {
    SeedConfig {
        users: 100,
        groups: 10,
        edges: 100,
        rng_seed: Some(rng_seed),
    }
}

fn seeded_store(rng_seed: u64) -> SqliteStore {
    let store = SqliteStore::open_in_memory().unwrap();
    seed_sample_data(&store, &sample_config(rng_seed)).unwrap();
    store
}

/// Every edge in the store, via the unkeyed index.
fn full_scan(store: &SqliteStore) -> Vec<Edge> {
    TraversalClient::new(store, PageSize::new(1000).unwrap())
        .traverse::<Edge>(EDGES_ALL, MatchKey::all())
        .collect_all()
        .unwrap()
}

// ===========================================================================
// 1. The sample membership graph
// ===========================================================================

#[test]
fn groups_for_user_six_matches_full_scan() {
    let store = seeded_store(2024);
    // Guarantee user 6 has more than one page of memberships.
    let writer = EdgeWriter::new(&store);
    for g in 1..=10 {
        match writer.create_edge(Edge::new(6, g)) {
            Ok(_) | Err(EdgeGraphError::ConstraintViolation(_)) => {}
            Err(e) => panic!("unexpected error: {e}"),
        }
    }
    for g in 11..=30 {
        writer.create_group(g).unwrap();
        writer.create_edge(Edge::new(6, g)).unwrap();
    }

    let expected: Vec<Edge> = full_scan(&store)
        .into_iter()
        .filter(|e| e.user_id == 6)
        .collect();
    assert_eq!(expected.len(), 30);

    let client = TraversalClient::new(&store, PageSize::DEFAULT);
    let mut traversal = client.groups_for_user(6);
    let got: Vec<Edge> = traversal.by_ref().collect::<Result<_, _>>().unwrap();

    assert_eq!(got, expected);
    assert_eq!(traversal.pages_fetched(), expected.len().div_ceil(16));
}

#[test]
fn every_user_and_group_traversal_partitions_the_edges() {
    let store = seeded_store(11);
    let all = full_scan(&store);
    let client = TraversalClient::new(&store, PageSize::new(3).unwrap());

    let mut by_user = Vec::new();
    for user in 1..=100 {
        by_user.extend(client.groups_for_user(user).collect_all().unwrap());
    }
    let mut by_group = Vec::new();
    for group in 1..=10 {
        by_group.extend(client.users_for_group(group).collect_all().unwrap());
    }

    let mut all_sorted = all.clone();
    all_sorted.sort();
    by_user.sort();
    by_group.sort();
    assert_eq!(by_user, all_sorted);
    assert_eq!(by_group, all_sorted);
}

#[test]
fn no_duplicate_pairs_survive_seeding() {
    let store = seeded_store(5);
    let mut edges = full_scan(&store);
    let total = edges.len();
    edges.sort();
    edges.dedup();
    assert_eq!(edges.len(), total);
}

#[test]
fn seeding_twice_keeps_indexes_and_rejects_repeats() {
    let store = SqliteStore::open_in_memory().unwrap();
    let config = SeedConfig {
        users: 3,
        groups: 2,
        edges: 20,
        rng_seed: Some(1),
    };
    let first = seed_sample_data(&store, &config).unwrap();
    let second = seed_sample_data(&store, &config).unwrap();

    assert_eq!(first.indexes.created.len(), standard_indexes().len());
    assert_eq!(second.indexes.existing.len(), standard_indexes().len());
    // Same RNG seed, same pairs: all rejected the second time.
    assert_eq!(second.edges_created, 0);
    assert_eq!(full_scan(&store).len(), first.edges_created);
}

// ===========================================================================
// 2. Concurrency
// ===========================================================================

#[test]
fn concurrent_traversals_share_one_store() {
    let store = Arc::new(seeded_store(77));
    let expected: Vec<Vec<Edge>> = (1..=8)
        .map(|u| {
            TraversalClient::new(store.as_ref(), PageSize::new(100).unwrap())
                .groups_for_user(u)
                .collect_all()
                .unwrap()
        })
        .collect();

    let handles: Vec<_> = (1..=8)
        .map(|user| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                TraversalClient::new(store.as_ref(), PageSize::new(2).unwrap())
                    .groups_for_user(user)
                    .collect_all()
                    .unwrap()
            })
        })
        .collect();

    for (handle, want) in handles.into_iter().zip(expected) {
        assert_eq!(handle.join().unwrap(), want);
    }
}

#[test]
fn parallel_helper_matches_sequential() {
    let store = seeded_store(3);
    let client = TraversalClient::new(&store, PageSize::new(4).unwrap());
    let users: Vec<i64> = (1..=100).collect();

    for (user, result) in client.groups_for_users(&users) {
        let sequential = client.groups_for_user(user).collect_all().unwrap();
        assert_eq!(result.unwrap(), sequential);
    }
}

// ===========================================================================
// 3. On-disk store
// ===========================================================================

#[test]
fn on_disk_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("members.db");
    let path = path.to_str().unwrap();
    let config = EdgeGraphConfig::default();

    let before = {
        let store = SqliteStore::open(path, config.database.busy_timeout()).unwrap();
        seed_sample_data(&store, &sample_config(9)).unwrap();
        full_scan(&store)
    };

    let store = SqliteStore::open(path, config.database.busy_timeout()).unwrap();
    assert_eq!(full_scan(&store), before);

    let spec = IndexCatalog::new(&store).describe(EDGES_BY_USER).unwrap();
    assert_eq!(spec.source, Collection::Edges.as_str());
}

#[test]
fn resume_after_interrupted_walk() {
    let store = seeded_store(4);
    let writer = EdgeWriter::new(&store);
    for g in 11..=25 {
        writer.create_group(g).unwrap();
        writer.create_edge(Edge::new(42, g)).unwrap();
    }
    let client = TraversalClient::new(&store, PageSize::new(4).unwrap());
    let full = client.groups_for_user(42).collect_all().unwrap();

    // Stop after the first page, keep only the cursor.
    let mut walk = client.groups_for_user(42);
    let head: Vec<Edge> = walk.by_ref().take(4).map(Result::unwrap).collect();
    let cursor = walk.last_cursor().cloned().unwrap();
    drop(walk);

    let tail = client
        .resume::<Edge>(EDGES_BY_USER, 42, cursor)
        .collect_all()
        .unwrap();
    assert_eq!([head, tail].concat(), full);
}

#[test]
fn missing_index_is_reported_not_retried() {
    let store = SqliteStore::open_in_memory().unwrap();
    IndexCatalog::new(&store)
        .ensure_collections(&Collection::ALL)
        .unwrap();

    let mut walk = TraversalClient::new(&store, PageSize::DEFAULT).groups_for_user(1);
    assert!(matches!(
        walk.next(),
        Some(Err(TraversalError::IndexNotFound(_)))
    ));
    assert!(walk.next().is_none());
}
