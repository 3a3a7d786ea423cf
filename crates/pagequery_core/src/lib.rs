//! Core paginated query engine.
//!
//! Offset and cursor pagination with composable filters over any
//! `RecordStore`. Ships a SQLite store and an in-memory document store.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod service;
pub mod store;

pub use config::{Catalog, EngineLimits};
pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, init_stderr_logging, logging_status, LogTarget};
pub use model::record::{FieldValue, Record, RecordKey};
pub use model::schema::{EntitySchema, FieldKind, FieldSpec, FilterMode, KeyKind, SchemaError};
pub use query::error::{QueryError, QueryResult};
pub use query::filter::{Filter, FilterClause, Predicate};
pub use query::page::{
    CursorPagination, OffsetPagination, PageRequest, PageResult, Pagination, SortDirection,
};
pub use query::request::{PageQueryRequest, ResolvedQuery};
pub use service::query_engine::QueryEngine;
pub use store::{
    GroupCount, MemoryRecordStore, OrderBy, ReadPlan, RecordStore, RecordWriter,
    SqliteRecordStore, StoreError, StoreResult,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
