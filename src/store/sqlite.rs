//! SQLite-backed [`DocumentStore`].
//!
//! Uses `rusqlite` with `prepare_cached` for every statement. Declared
//! indexes become partial expression indexes over `documents`, so an index
//! match is a plain equality on `json_extract(data, ...)` that SQLite can
//! answer from the index, ordered by document id.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, InterruptHandle, OptionalExtension};
use serde_json::Value;

use super::{DocumentStore, Expr, Fetch, PaginateQuery, QueryResult};
use crate::catalog::{is_identifier, FieldPath, IndexSpec};
use crate::db::schema::{apply_schema, initialize_database, DOC_INDEX_PREFIX};
use crate::error::StoreError;
use crate::types::{Cursor, DocRef, Page};

// ---------------------------------------------------------------------------
// SQL constants
// ---------------------------------------------------------------------------

const INSERT_COLLECTION_SQL: &str = "INSERT OR IGNORE INTO collections (name) VALUES (?1)";

const COLLECTION_EXISTS_SQL: &str = "SELECT COUNT(*) FROM collections WHERE name = ?1";

const GET_INDEX_SQL: &str = "\
SELECT source, terms, is_unique FROM index_catalog WHERE name = ?1";

const INSERT_INDEX_SQL: &str = "\
INSERT INTO index_catalog (name, source, terms, is_unique) VALUES (?1, ?2, ?3, ?4)";

const INSERT_DOCUMENT_SQL: &str = "INSERT INTO documents (collection, data) VALUES (?1, ?2)";

/// Busy timeout used by [`SqliteStore::open_in_memory`].
const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// SqliteStore
// ---------------------------------------------------------------------------

/// Document store over a single SQLite connection.
///
/// The connection sits behind a mutex so one handle can serve concurrent
/// traversals; each query holds the lock only for its own duration.
pub struct SqliteStore {
    conn: Mutex<Connection>,
    interrupt: InterruptHandle,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (or create) the database at `db_path` with the schema applied.
    pub fn open(db_path: &str, busy_timeout: Duration) -> Result<Self, StoreError> {
        let conn = initialize_database(db_path, busy_timeout)?;
        Ok(Self::wrap(conn))
    }

    /// Fresh private in-memory store.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::open(":memory:", DEFAULT_BUSY_TIMEOUT)
    }

    /// Wrap an already-open connection, applying the schema if needed.
    pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
        apply_schema(&conn)?;
        Ok(Self::wrap(conn))
    }

    fn wrap(conn: Connection) -> Self {
        let interrupt = conn.get_interrupt_handle();
        Self {
            conn: Mutex::new(conn),
            interrupt,
        }
    }

    /// Handle that cancels whatever query is currently running on this
    /// store. The cancelled query fails with [`StoreError::Timeout`].
    pub fn interrupt_handle(&self) -> &InterruptHandle {
        &self.interrupt
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Unavailable("store connection lock poisoned".into()))
    }
}

impl DocumentStore for SqliteStore {
    fn query(&self, expr: &Expr) -> Result<QueryResult, StoreError> {
        let conn = self.lock()?;
        match expr {
            Expr::CreateCollection { name } => create_collection(&conn, name),
            Expr::CreateIndex(spec) => create_index(&conn, spec),
            Expr::GetIndex { name } => get_index(&conn, name)?
                .map(QueryResult::Index)
                .ok_or_else(|| StoreError::NotFound(format!("index '{name}'"))),
            Expr::Create { collection, data } => create_document(&conn, collection, data),
            Expr::Paginate(query) => paginate(&conn, query).map(QueryResult::Page),
        }
    }
}

// ---------------------------------------------------------------------------
// Collections & documents
// ---------------------------------------------------------------------------

fn create_collection(conn: &Connection, name: &str) -> Result<QueryResult, StoreError> {
    if !is_identifier(name) {
        return Err(StoreError::InvalidRequest(format!(
            "invalid collection name '{name}'"
        )));
    }
    let mut stmt = conn.prepare_cached(INSERT_COLLECTION_SQL)?;
    let changed = stmt.execute(params![name])?;
    Ok(QueryResult::Collection {
        created: changed > 0,
    })
}

fn collection_exists(conn: &Connection, name: &str) -> Result<bool, StoreError> {
    let mut stmt = conn.prepare_cached(COLLECTION_EXISTS_SQL)?;
    let count: i64 = stmt.query_row(params![name], |row| row.get(0))?;
    Ok(count > 0)
}

fn create_document(
    conn: &Connection,
    collection: &str,
    data: &Value,
) -> Result<QueryResult, StoreError> {
    if !data.is_object() {
        return Err(StoreError::InvalidRequest(
            "document data must be a JSON object".into(),
        ));
    }
    if !collection_exists(conn, collection)? {
        return Err(StoreError::NotFound(format!("collection '{collection}'")));
    }
    let mut stmt = conn.prepare_cached(INSERT_DOCUMENT_SQL)?;
    stmt.execute(params![collection, data.to_string()])?;
    Ok(QueryResult::Ref(DocRef {
        collection: collection.to_string(),
        id: conn.last_insert_rowid(),
    }))
}

// ---------------------------------------------------------------------------
// Indexes
// ---------------------------------------------------------------------------

fn get_index(conn: &Connection, name: &str) -> Result<Option<IndexSpec>, StoreError> {
    let mut stmt = conn.prepare_cached(GET_INDEX_SQL)?;
    let row: Option<(String, String, bool)> = stmt
        .query_row(params![name], |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)))
        .optional()?;

    match row {
        Some((source, terms, unique)) => {
            let terms: Vec<FieldPath> = serde_json::from_str(&terms)?;
            Ok(Some(IndexSpec {
                name: name.to_string(),
                source,
                terms,
                unique,
            }))
        }
        None => Ok(None),
    }
}

fn create_index(conn: &Connection, spec: &IndexSpec) -> Result<QueryResult, StoreError> {
    let paths = spec.validate().map_err(StoreError::InvalidRequest)?;
    if !collection_exists(conn, &spec.source)? {
        return Err(StoreError::NotFound(format!("collection '{}'", spec.source)));
    }
    if get_index(conn, &spec.name)?.is_some() {
        return Err(StoreError::InvalidRequest(format!(
            "index '{}' already exists",
            spec.name
        )));
    }

    let tx = conn.unchecked_transaction()?;
    tx.execute(
        INSERT_INDEX_SQL,
        params![
            spec.name,
            spec.source,
            serde_json::to_string(&spec.terms)?,
            spec.unique
        ],
    )?;
    if !paths.is_empty() {
        let ddl = format!(
            "CREATE {unique}INDEX {DOC_INDEX_PREFIX}{name} ON documents({exprs}) \
             WHERE collection = '{source}'",
            unique = if spec.unique { "UNIQUE " } else { "" },
            name = spec.name,
            exprs = term_expressions(&paths).join(", "),
            source = spec.source,
        );
        tx.execute_batch(&ddl)?;
    }
    tx.commit()?;

    tracing::debug!(index = %spec.name, "materialised index");
    Ok(QueryResult::Index(spec.clone()))
}

/// SQL expression for each term. Queries must repeat these verbatim for
/// SQLite to pick the expression index.
fn term_expressions(paths: &[String]) -> Vec<String> {
    paths
        .iter()
        .map(|p| format!("json_extract(data, '{p}')"))
        .collect()
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

fn paginate(conn: &Connection, query: &PaginateQuery) -> Result<Page<Value>, StoreError> {
    let spec = get_index(conn, &query.index)?
        .ok_or_else(|| StoreError::NotFound(format!("index '{}'", query.index)))?;
    if query.terms.len() != spec.terms.len() {
        return Err(StoreError::InvalidRequest(format!(
            "index '{}' takes {} term(s), got {}",
            spec.name,
            spec.terms.len(),
            query.terms.len()
        )));
    }
    let paths = spec.validate().map_err(StoreError::InvalidRequest)?;
    let start = match &query.after {
        Some(cursor) => decode_cursor(cursor)?,
        None => i64::MIN,
    };

    let mut sql = format!(
        "SELECT id, data FROM documents WHERE collection = '{}'",
        spec.source
    );
    let mut bind: Vec<SqlValue> = Vec::with_capacity(paths.len() + 2);
    for (expr, term) in term_expressions(&paths).iter().zip(&query.terms) {
        bind.push(term_to_sql(term)?);
        sql.push_str(&format!(" AND {expr} = ?{}", bind.len()));
    }
    bind.push(SqlValue::Integer(start));
    sql.push_str(&format!(" AND id >= ?{}", bind.len()));
    // One extra row tells us whether another page exists. Sizes beyond i64
    // run unbounded (LIMIT -1).
    let limit = i64::try_from(query.size.get())
        .ok()
        .and_then(|n| n.checked_add(1))
        .unwrap_or(-1);
    bind.push(SqlValue::Integer(limit));
    sql.push_str(&format!(" ORDER BY id LIMIT ?{}", bind.len()));

    let mut stmt = conn.prepare_cached(&sql)?;
    let mut rows = stmt
        .query_map(params_from_iter(bind), |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let after = if rows.len() > query.size.get() {
        rows.pop().map(|(next_id, _)| encode_cursor(next_id))
    } else {
        None
    };

    let data = rows
        .into_iter()
        .map(|(id, data)| match query.fetch {
            Fetch::Refs => serde_json::to_value(DocRef {
                collection: spec.source.clone(),
                id,
            }),
            Fetch::Data => serde_json::from_str(&data),
        })
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Page { data, after })
}

fn term_to_sql(term: &Value) -> Result<SqlValue, StoreError> {
    match term {
        Value::Bool(b) => Ok(SqlValue::Integer(i64::from(*b))),
        Value::Number(n) => n
            .as_i64()
            .map(SqlValue::Integer)
            .or_else(|| n.as_f64().map(SqlValue::Real))
            .ok_or_else(|| StoreError::InvalidRequest(format!("unsupported number {n}"))),
        Value::String(s) => Ok(SqlValue::Text(s.clone())),
        other => Err(StoreError::InvalidRequest(format!(
            "index terms must be scalars, got {other}"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Cursor encoding
// ---------------------------------------------------------------------------

/// The cursor names the first document of the next page.
fn encode_cursor(next_id: i64) -> Cursor {
    Cursor::from_token(hex::encode(next_id.to_be_bytes()))
}

fn decode_cursor(cursor: &Cursor) -> Result<i64, StoreError> {
    let malformed = || StoreError::InvalidRequest(format!("malformed cursor '{cursor}'"));
    let bytes = hex::decode(cursor.as_str()).map_err(|_| malformed())?;
    let bytes: [u8; 8] = bytes.as_slice().try_into().map_err(|_| malformed())?;
    Ok(i64::from_be_bytes(bytes))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
