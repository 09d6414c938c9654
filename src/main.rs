use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};

use edgegraph::catalog::{standard_indexes, IndexCatalog};
use edgegraph::config::EdgeGraphConfig;
use edgegraph::error::{EdgeGraphError, Result};
use edgegraph::observability::init_logging;
use edgegraph::seed::seed_sample_data;
use edgegraph::store::SqliteStore;
use edgegraph::traversal::{Traversal, TraversalClient};
use edgegraph::types::{Edge, PageSize};

#[derive(Parser, Debug)]
#[command(
    name = "edgegraph",
    author,
    version,
    about = "User/group membership traversal over a SQLite document store"
)]
struct Cli {
    /// Database file (overrides config and EDGEGRAPH_DB).
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// YAML config file (default: ./edgegraph.yaml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Records per page (overrides config and EDGEGRAPH_PAGE_SIZE).
    #[arg(long, global = true)]
    page_size: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create collections and indexes, then fill them with sample data.
    Seed {
        /// Delete the database file first.
        #[arg(long)]
        fresh: bool,
    },
    /// List the groups a user belongs to.
    Groups {
        #[arg(long)]
        user: i64,
    },
    /// List the users in a group.
    Users {
        #[arg(long)]
        group: i64,
    },
    /// Show the declared indexes.
    Indexes,
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    let mut config = EdgeGraphConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.database.path = db;
    }
    if let Some(size) = cli.page_size {
        config.traversal.page_size = PageSize::new(size)?;
    }

    if let Command::Seed { fresh: true } = cli.command {
        remove_database(&config.database.path)?;
    }

    let store = open_store(&config)?;

    match cli.command {
        Command::Seed { .. } => {
            let report = seed_sample_data(&store, &config.seed)?;
            println!(
                "seeded {} users, {} groups, {} edges ({} duplicates rejected)",
                report.users, report.groups, report.edges_created, report.duplicate_edges
            );
        }
        Command::Groups { user } => {
            let client = TraversalClient::new(&store, config.traversal.page_size);
            print_edges(client.groups_for_user(user))?;
        }
        Command::Users { group } => {
            let client = TraversalClient::new(&store, config.traversal.page_size);
            print_edges(client.users_for_group(group))?;
        }
        Command::Indexes => {
            let catalog = IndexCatalog::new(&store);
            for declared in standard_indexes() {
                match catalog.describe(&declared.name) {
                    Ok(spec) => {
                        let terms: Vec<String> = spec.terms.iter().map(|t| t.to_string()).collect();
                        println!(
                            "{:<16} source={:<7} terms=[{}]{}",
                            spec.name,
                            spec.source,
                            terms.join(", "),
                            if spec.unique { " unique" } else { "" }
                        );
                    }
                    Err(EdgeGraphError::IndexNotFound(name)) => {
                        println!("{name:<16} (missing, run `edgegraph seed`)");
                    }
                    Err(e) => return Err(e),
                }
            }
        }
    }

    Ok(())
}

fn open_store(config: &EdgeGraphConfig) -> Result<SqliteStore> {
    let path = config.database.path.to_str().ok_or_else(|| {
        EdgeGraphError::Configuration(format!(
            "database path is not valid UTF-8: {}",
            config.database.path.display()
        ))
    })?;
    Ok(SqliteStore::open(path, config.database.busy_timeout())?)
}

fn remove_database(path: &Path) -> Result<()> {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        match std::fs::remove_file(&file) {
            Ok(()) => tracing::info!(path = ?file, "removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(())
}

fn print_edges(mut traversal: Traversal<'_, SqliteStore, Edge>) -> Result<()> {
    let mut count = 0usize;
    for edge in traversal.by_ref() {
        println!("{}", edge?);
        count += 1;
    }
    println!("{count} edges in {} pages", traversal.pages_fetched());
    Ok(())
}
