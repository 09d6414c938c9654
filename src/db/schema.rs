//! SQLite schema initialization for the EdgeGraph document store.
//!
//! Documents of every collection share one table; their payload is a JSON
//! object in `data`. Declared secondary indexes live in `index_catalog` and
//! are materialised as partial expression indexes over `documents`.

use std::time::Duration;

use rusqlite::Connection;

// ---------------------------------------------------------------------------
// DDL constants
// ---------------------------------------------------------------------------

const CREATE_COLLECTIONS: &str = "\
CREATE TABLE IF NOT EXISTS collections (
  name TEXT PRIMARY KEY,
  created_at INTEGER DEFAULT (strftime('%s','now'))
)";

const CREATE_DOCUMENTS: &str = "\
CREATE TABLE IF NOT EXISTS documents (
  id INTEGER PRIMARY KEY AUTOINCREMENT,
  collection TEXT NOT NULL,
  data TEXT NOT NULL CHECK (json_valid(data)),
  created_at INTEGER DEFAULT (strftime('%s','now'))
)";

const CREATE_INDEX_CATALOG: &str = "\
CREATE TABLE IF NOT EXISTS index_catalog (
  name TEXT PRIMARY KEY,
  source TEXT NOT NULL,
  terms TEXT NOT NULL,
  is_unique INTEGER NOT NULL DEFAULT 0,
  created_at INTEGER DEFAULT (strftime('%s','now'))
)";

// Indexes ----------------------------------------------------------------

const CREATE_INDEXES: &[&str] =
    &["CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection, id)"];

/// Prefix of the SQLite index backing a declared index.
pub const DOC_INDEX_PREFIX: &str = "idx_doc_";

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Open (or create) the SQLite database at `db_path` and apply the schema.
///
/// `busy_timeout` bounds how long a query waits on a locked database before
/// failing with `SQLITE_BUSY`.
///
/// # Errors
///
/// Returns a `rusqlite::Error` if the database cannot be opened or any DDL
/// statement fails.
pub fn initialize_database(db_path: &str, busy_timeout: Duration) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;

    // -- Pragmas ----------------------------------------------------------
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.busy_timeout(busy_timeout)?;

    apply_schema(&conn)?;
    Ok(conn)
}

/// Apply the tables and fixed indexes to an already-open connection.
pub fn apply_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(CREATE_COLLECTIONS)?;
    conn.execute_batch(CREATE_DOCUMENTS)?;
    conn.execute_batch(CREATE_INDEX_CATALOG)?;
    for ddl in CREATE_INDEXES {
        conn.execute_batch(ddl)?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
