//! Record store contracts and implementations.
//!
//! # Responsibility
//! - Define the read/write contract the query engine issues against.
//! - Keep storage-specific translation (SQL `WHERE` clauses, document
//!   predicate evaluation) inside each implementation.
//!
//! # Invariants
//! - Every field named by a plan must exist in the plan's schema; stores
//!   reject unknown fields instead of guessing.
//! - Reads order by the plan's sort field, then by key ascending.
//! - `delete_by_key` removes exactly the matching record and nothing else.
//! - Store handles are owned by the caller; stores never open connections.

use crate::db::DbError;
use crate::model::record::{FieldValue, Record, RecordKey};
use crate::model::schema::{EntitySchema, FieldSpec};
use crate::query::filter::{Filter, FilterClause};
use crate::query::page::SortDirection;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryRecordStore;
pub use sqlite::SqliteRecordStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// Failure reported by a record store.
#[derive(Debug)]
pub enum StoreError {
    Db(DbError),
    UnknownField { entity: String, field: String },
    InvalidData(String),
    DuplicateKey { entity: String, key: RecordKey },
    MissingRequiredTable(String),
    MissingRequiredColumn { table: String, column: String },
}

impl Display for StoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UnknownField { entity, field } => {
                write!(f, "unknown field `{field}` for entity `{entity}`")
            }
            Self::InvalidData(message) => write!(f, "invalid stored data: {message}"),
            Self::DuplicateKey { entity, key } => {
                write!(f, "duplicate key `{key}` in entity `{entity}`")
            }
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::MissingRequiredColumn { table, column } => {
                write!(f, "missing required column `{table}.{column}`")
            }
        }
    }
}

impl Error for StoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StoreError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Ordering applied to a read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub field: String,
    pub direction: SortDirection,
}

/// One read issued against a store: filter clauses, ordering and window.
#[derive(Debug, Clone, PartialEq)]
pub struct ReadPlan<'a> {
    pub schema: &'a EntitySchema,
    pub clauses: Vec<FilterClause>,
    pub order: Option<OrderBy>,
    pub skip: u64,
    /// `None` reads every match after `skip`.
    pub take: Option<u64>,
}

impl<'a> ReadPlan<'a> {
    pub fn new(schema: &'a EntitySchema, filter: &Filter) -> Self {
        Self {
            schema,
            clauses: filter.clauses().to_vec(),
            order: None,
            skip: 0,
            take: None,
        }
    }

    pub fn with_clause(mut self, clause: FilterClause) -> Self {
        self.clauses.push(clause);
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.order = Some(OrderBy {
            field: field.into(),
            direction,
        });
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = skip;
        self
    }

    pub fn take(mut self, take: u64) -> Self {
        self.take = Some(take);
        self
    }

    /// Resolves `field` in the plan schema or reports it as unknown.
    pub fn field(&self, field: &str) -> StoreResult<&'a FieldSpec> {
        self.schema
            .field(field)
            .ok_or_else(|| StoreError::UnknownField {
                entity: self.schema.name().to_string(),
                field: field.to_string(),
            })
    }

    /// Checks every clause and order field against the schema.
    pub fn validate(&self) -> StoreResult<()> {
        for clause in &self.clauses {
            self.field(clause.field())?;
        }
        if let Some(order) = &self.order {
            self.field(&order.field)?;
        }
        Ok(())
    }
}

/// Number of matches sharing one value of a grouped field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupCount {
    pub value: FieldValue,
    pub count: u64,
}

/// Read contract used by the query engine.
pub trait RecordStore {
    /// Counts records matching every plan clause. Ordering and window are
    /// ignored.
    fn count(&self, plan: &ReadPlan<'_>) -> StoreResult<u64>;
    /// Returns the ordered window of matching records.
    fn fetch(&self, plan: &ReadPlan<'_>) -> StoreResult<Vec<Record>>;
    /// Groups matching records by `field`, keeping groups with at least
    /// `min_count` members, ordered by count descending then value ascending.
    fn group_count(
        &self,
        plan: &ReadPlan<'_>,
        field: &str,
        min_count: u64,
    ) -> StoreResult<Vec<GroupCount>>;
    /// Point lookup by unique key.
    fn get(&self, schema: &EntitySchema, key: &RecordKey) -> StoreResult<Option<Record>>;
}

/// Write contract for record fixtures and CRUD callers.
pub trait RecordWriter {
    /// Inserts one record and returns its key.
    ///
    /// A missing key is generated: next integer for integer keys, UUID v4
    /// text for text keys.
    fn insert(&mut self, schema: &EntitySchema, record: &Record) -> StoreResult<RecordKey>;
    /// Deletes exactly the record with `key`. Returns whether it existed.
    fn delete_by_key(&mut self, schema: &EntitySchema, key: &RecordKey) -> StoreResult<bool>;
}

/// Splits `record` into its key (if set) and checks every field is known.
pub(crate) fn prepare_insert(
    schema: &EntitySchema,
    record: &Record,
) -> StoreResult<Option<RecordKey>> {
    for (name, _) in record.fields() {
        if schema.field(name).is_none() {
            return Err(StoreError::UnknownField {
                entity: schema.name().to_string(),
                field: name.to_string(),
            });
        }
    }

    match record.get(schema.key_field()) {
        None | Some(FieldValue::Null) => Ok(None),
        Some(value) => record.key(schema).map(Some).ok_or_else(|| {
            StoreError::InvalidData(format!(
                "key `{}.{}` has wrong kind: {value:?}",
                schema.name(),
                schema.key_field()
            ))
        }),
    }
}

pub(crate) fn check_key_kind(schema: &EntitySchema, key: &RecordKey) -> StoreResult<()> {
    if key.kind() == schema.key_kind() {
        Ok(())
    } else {
        Err(StoreError::InvalidData(format!(
            "key `{key}` does not match key kind of `{}.{}`",
            schema.name(),
            schema.key_field()
        )))
    }
}
