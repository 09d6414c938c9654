//! Database layer — SQLite schema for the document store.

pub mod schema;
