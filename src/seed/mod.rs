//! Writer path and sample-data bootstrap.
//!
//! [`EdgeWriter`] creates user, group and edge documents. [`seed_sample_data`]
//! sets up the three collections with their standard indexes and fills them
//! with a random membership graph.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::catalog::{standard_indexes, EnsureReport, IndexCatalog};
use crate::error::{EdgeGraphError, Result, StoreError};
use crate::store::{DocumentStore, Expr};
use crate::types::{Collection, DocRef, Edge, Group, User};

// ---------------------------------------------------------------------------
// EdgeWriter
// ---------------------------------------------------------------------------

/// Creates membership documents.
pub struct EdgeWriter<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: DocumentStore + ?Sized> EdgeWriter<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    pub fn create_user(&self, id: i64) -> Result<DocRef> {
        self.create(Collection::Users, User { id })
    }

    pub fn create_group(&self, id: i64) -> Result<DocRef> {
        self.create(Collection::Groups, Group { id })
    }

    /// Link a user to a group.
    ///
    /// A pair that already exists is rejected with
    /// [`EdgeGraphError::ConstraintViolation`]; the stored edge is untouched.
    pub fn create_edge(&self, edge: Edge) -> Result<DocRef> {
        self.create(Collection::Edges, edge)
            .map_err(|e| match e {
                EdgeGraphError::Store(StoreError::ConstraintViolation(_)) => {
                    EdgeGraphError::ConstraintViolation(format!("edge {edge} already exists"))
                }
                other => other,
            })
    }

    fn create(&self, collection: Collection, record: impl Serialize) -> Result<DocRef> {
        let data = serde_json::to_value(record).map_err(StoreError::from)?;
        let result = self.store.query(&Expr::Create {
            collection: collection.as_str().to_string(),
            data,
        })?;
        Ok(result.into_ref()?)
    }
}

// ---------------------------------------------------------------------------
// Seeding
// ---------------------------------------------------------------------------

/// How much sample data to generate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default = "default_users")]
    pub users: i64,

    #[serde(default = "default_groups")]
    pub groups: i64,

    /// Edges to attempt; duplicates are rejected, so fewer may land.
    #[serde(default = "default_edges")]
    pub edges: usize,

    /// Fixed RNG seed for reproducible graphs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rng_seed: Option<u64>,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            users: default_users(),
            groups: default_groups(),
            edges: default_edges(),
            rng_seed: None,
        }
    }
}

fn default_users() -> i64 {
    100
}

fn default_groups() -> i64 {
    10
}

fn default_edges() -> usize {
    100
}

/// Outcome of a seeding run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub indexes: EnsureReport,
    pub users: usize,
    pub groups: usize,
    pub edges_created: usize,
    /// Random pairs that already existed.
    pub duplicate_edges: usize,
}

/// Bootstrap collections and indexes, then generate users, groups and random
/// edges between them.
pub fn seed_sample_data<S: DocumentStore + ?Sized>(
    store: &S,
    config: &SeedConfig,
) -> Result<SeedReport> {
    if config.users < 1 || config.groups < 1 {
        return Err(EdgeGraphError::Configuration(
            "seed needs at least one user and one group".into(),
        ));
    }

    let catalog = IndexCatalog::new(store);
    catalog.ensure_collections(&Collection::ALL)?;
    let indexes = catalog.ensure_indexes(&standard_indexes())?;

    let writer = EdgeWriter::new(store);
    let mut report = SeedReport {
        indexes,
        ..SeedReport::default()
    };

    for id in 1..=config.users {
        writer.create_user(id)?;
        report.users += 1;
    }
    for id in 1..=config.groups {
        writer.create_group(id)?;
        report.groups += 1;
    }
    tracing::info!(users = report.users, groups = report.groups, "created users and groups");

    let mut rng = match config.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    for i in 0..config.edges {
        let edge = Edge::new(
            rng.gen_range(1..=config.users),
            rng.gen_range(1..=config.groups),
        );
        match writer.create_edge(edge) {
            Ok(_) => report.edges_created += 1,
            Err(EdgeGraphError::ConstraintViolation(_)) => {
                tracing::debug!(%edge, "duplicate edge rejected");
                report.duplicate_edges += 1;
                continue;
            }
            Err(e) => return Err(e),
        }
        if is_progress_edge(i) {
            tracing::info!("{edge}");
        }
    }

    tracing::info!(
        created = report.edges_created,
        duplicates = report.duplicate_edges,
        "seeded edges"
    );
    Ok(report)
}

/// Whether the `attempt`-th (0-based) edge is a tenth one worth logging.
fn is_progress_edge(attempt: usize) -> bool {
    (attempt + 1) % 10 == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
