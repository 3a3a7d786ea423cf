//! SQLite-backed record store.
//!
//! # Responsibility
//! - Translate read plans into parameterized `SELECT` statements.
//! - Decode rows into schema-ordered records.
//!
//! # Invariants
//! - Only schema-validated identifiers are spliced into SQL; every value is
//!   bound as a parameter.
//! - Substring needles escape `%`, `_` and `\` before `LIKE`.
//! - Substring matching folds case with `pq_lower`, so connections must
//!   come from `db::open_db*` or `db::register_functions`.
//! - Results order by the plan sort field, then key ascending.
//!
//! # See also
//! - store::memory for the document-style counterpart.

use crate::db::UNICODE_LOWER;
use crate::model::record::{FieldValue, Record, RecordKey};
use crate::model::schema::{EntitySchema, KeyKind};
use crate::query::filter::{FilterClause, Predicate};
use crate::store::{
    check_key_kind, prepare_insert, GroupCount, ReadPlan, RecordStore, RecordWriter, StoreError,
    StoreResult,
};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection, Row};
use uuid::Uuid;

/// Record store over a caller-owned SQLite connection.
///
/// Each schema maps to a table of the same name; each field to a column.
pub struct SqliteRecordStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRecordStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }

    /// Checks the schema's table and every declared column exist.
    pub fn verify_schema(&self, schema: &EntitySchema) -> StoreResult<()> {
        if !table_exists(self.conn, schema.name())? {
            return Err(StoreError::MissingRequiredTable(schema.name().to_string()));
        }

        let columns = table_columns(self.conn, schema.name())?;
        for field in schema.fields() {
            if !columns.iter().any(|column| column == field.name()) {
                return Err(StoreError::MissingRequiredColumn {
                    table: schema.name().to_string(),
                    column: field.name().to_string(),
                });
            }
        }

        Ok(())
    }

    fn query_records(&self, schema: &EntitySchema, sql: &str, binds: Vec<Value>) -> StoreResult<Vec<Record>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut records = Vec::new();

        while let Some(row) = rows.next()? {
            records.push(parse_record_row(schema, row)?);
        }

        Ok(records)
    }
}

impl RecordStore for SqliteRecordStore<'_> {
    fn count(&self, plan: &ReadPlan<'_>) -> StoreResult<u64> {
        plan.validate()?;
        let (where_sql, binds) = render_where(plan)?;
        let sql = format!(
            "SELECT COUNT(*) FROM {}{where_sql};",
            quote_identifier(plan.schema.name())
        );

        let total: i64 = self
            .conn
            .query_row(&sql, params_from_iter(binds), |row| row.get(0))?;
        u64::try_from(total)
            .map_err(|_| StoreError::InvalidData(format!("negative row count {total}")))
    }

    fn fetch(&self, plan: &ReadPlan<'_>) -> StoreResult<Vec<Record>> {
        plan.validate()?;
        let schema = plan.schema;
        let (where_sql, mut binds) = render_where(plan)?;
        let mut sql = format!(
            "SELECT {} FROM {}{where_sql}",
            select_columns(schema),
            quote_identifier(schema.name())
        );

        let key_column = quote_identifier(schema.key_field());
        match &plan.order {
            Some(order) if order.field != schema.key_field() => {
                sql.push_str(&format!(
                    " ORDER BY {} {}, {key_column} ASC",
                    quote_identifier(&order.field),
                    order.direction.as_sql()
                ));
            }
            Some(order) => {
                sql.push_str(&format!(" ORDER BY {key_column} {}", order.direction.as_sql()));
            }
            None => sql.push_str(&format!(" ORDER BY {key_column} ASC")),
        }

        if let Some(take) = plan.take {
            sql.push_str(" LIMIT ?");
            binds.push(Value::Integer(clamp_to_i64(take)));
            if plan.skip > 0 {
                sql.push_str(" OFFSET ?");
                binds.push(Value::Integer(clamp_to_i64(plan.skip)));
            }
        } else if plan.skip > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            binds.push(Value::Integer(clamp_to_i64(plan.skip)));
        }

        self.query_records(schema, &sql, binds)
    }

    fn group_count(
        &self,
        plan: &ReadPlan<'_>,
        field: &str,
        min_count: u64,
    ) -> StoreResult<Vec<GroupCount>> {
        plan.validate()?;
        plan.field(field)?;
        let (where_sql, mut binds) = render_where(plan)?;
        let column = quote_identifier(field);
        let sql = format!(
            "SELECT {column}, COUNT(*) AS group_count
             FROM {}{where_sql}
             GROUP BY {column}
             HAVING COUNT(*) >= ?
             ORDER BY group_count DESC, {column} ASC;",
            quote_identifier(plan.schema.name())
        );
        binds.push(Value::Integer(clamp_to_i64(min_count)));

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(binds))?;
        let mut groups = Vec::new();
        while let Some(row) = rows.next()? {
            let value = decode_value(plan.schema.name(), field, row.get(0)?)?;
            let count: i64 = row.get(1)?;
            groups.push(GroupCount {
                value,
                count: u64::try_from(count).map_err(|_| {
                    StoreError::InvalidData(format!("negative group count {count}"))
                })?,
            });
        }

        Ok(groups)
    }

    fn get(&self, schema: &EntitySchema, key: &RecordKey) -> StoreResult<Option<Record>> {
        check_key_kind(schema, key)?;
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT 1;",
            select_columns(schema),
            quote_identifier(schema.name()),
            quote_identifier(schema.key_field())
        );
        let records = self.query_records(schema, &sql, vec![key_to_sql(key)])?;
        Ok(records.into_iter().next())
    }
}

impl RecordWriter for SqliteRecordStore<'_> {
    fn insert(&mut self, schema: &EntitySchema, record: &Record) -> StoreResult<RecordKey> {
        let provided_key = prepare_insert(schema, record)?;
        let generated_key = match (&provided_key, schema.key_kind()) {
            (None, KeyKind::Text) => Some(RecordKey::Text(Uuid::new_v4().to_string())),
            _ => None,
        };

        let mut columns = Vec::new();
        let mut binds = Vec::new();
        for (name, value) in record.fields() {
            if schema.is_key(name) {
                continue;
            }
            columns.push(quote_identifier(name));
            binds.push(value_to_sql(value));
        }
        if let Some(key) = provided_key.as_ref().or(generated_key.as_ref()) {
            columns.insert(0, quote_identifier(schema.key_field()));
            binds.insert(0, key_to_sql(key));
        }

        let table = quote_identifier(schema.name());
        let sql = if columns.is_empty() {
            format!("INSERT INTO {table} DEFAULT VALUES;")
        } else {
            let placeholders = vec!["?"; columns.len()].join(", ");
            format!(
                "INSERT INTO {table} ({}) VALUES ({placeholders});",
                columns.join(", ")
            )
        };
        self.conn.execute(&sql, params_from_iter(binds))?;

        Ok(match provided_key.or(generated_key) {
            Some(key) => key,
            None => RecordKey::Integer(self.conn.last_insert_rowid()),
        })
    }

    fn delete_by_key(&mut self, schema: &EntitySchema, key: &RecordKey) -> StoreResult<bool> {
        check_key_kind(schema, key)?;
        let sql = format!(
            "DELETE FROM {} WHERE {} = ?1;",
            quote_identifier(schema.name()),
            quote_identifier(schema.key_field())
        );
        let changed = self.conn.execute(&sql, [key_to_sql(key)])?;
        Ok(changed > 0)
    }
}

/// Renders plan clauses as ` WHERE 1 = 1 AND ...` plus bind values.
fn render_where(plan: &ReadPlan<'_>) -> StoreResult<(String, Vec<Value>)> {
    let mut sql = String::from(" WHERE 1 = 1");
    let mut binds = Vec::with_capacity(plan.clauses.len());

    for clause in &plan.clauses {
        let column = quote_identifier(plan.field(clause.field())?.name());
        match clause.predicate() {
            Predicate::Contains => {
                sql.push_str(&format!(" AND {UNICODE_LOWER}({column}) LIKE ? ESCAPE '\\'"));
                binds.push(Value::Text(format!("%{}%", escape_like(&needle(clause)?))));
            }
            Predicate::Equals => {
                sql.push_str(&format!(" AND {column} = ?"));
                binds.push(value_to_sql(clause.value()));
            }
            Predicate::GreaterThan => {
                sql.push_str(&format!(" AND {column} > ?"));
                binds.push(value_to_sql(clause.value()));
            }
            Predicate::LessThan => {
                sql.push_str(&format!(" AND {column} < ?"));
                binds.push(value_to_sql(clause.value()));
            }
        }
    }

    Ok((sql, binds))
}

fn needle(clause: &FilterClause) -> StoreResult<String> {
    match clause.value() {
        FieldValue::Text(value) => Ok(value.to_lowercase()),
        other => Err(StoreError::InvalidData(format!(
            "substring filter on `{}` needs text, got {other:?}",
            clause.field()
        ))),
    }
}

/// Escapes `LIKE` wildcards so the needle matches literally.
fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn quote_identifier(name: &str) -> String {
    format!("\"{name}\"")
}

fn select_columns(schema: &EntitySchema) -> String {
    schema
        .fields()
        .iter()
        .map(|field| quote_identifier(field.name()))
        .collect::<Vec<_>>()
        .join(", ")
}

fn parse_record_row(schema: &EntitySchema, row: &Row<'_>) -> StoreResult<Record> {
    let mut record = Record::new();
    for (index, field) in schema.fields().iter().enumerate() {
        let value = decode_value(schema.name(), field.name(), row.get(index)?)?;
        record.set(field.name(), value);
    }
    Ok(record)
}

fn decode_value(table: &str, column: &str, value: Value) -> StoreResult<FieldValue> {
    match value {
        Value::Null => Ok(FieldValue::Null),
        Value::Integer(value) => Ok(FieldValue::Integer(value)),
        Value::Real(value) => Ok(FieldValue::Real(value)),
        Value::Text(value) => Ok(FieldValue::Text(value)),
        Value::Blob(_) => Err(StoreError::InvalidData(format!(
            "blob value in `{table}.{column}` is not supported"
        ))),
    }
}

fn value_to_sql(value: &FieldValue) -> Value {
    match value {
        FieldValue::Null => Value::Null,
        FieldValue::Integer(value) => Value::Integer(*value),
        FieldValue::Real(value) => Value::Real(*value),
        FieldValue::Text(value) => Value::Text(value.clone()),
    }
}

fn key_to_sql(key: &RecordKey) -> Value {
    value_to_sql(&key.to_field_value())
}

fn clamp_to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn table_exists(conn: &Connection, table: &str) -> StoreResult<bool> {
    let exists: i64 = conn.query_row(
        "SELECT EXISTS(
            SELECT 1
            FROM sqlite_master
            WHERE type = 'table' AND name = ?1
        );",
        [table],
        |row| row.get(0),
    )?;
    Ok(exists == 1)
}

fn table_columns(conn: &Connection, table: &str) -> StoreResult<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({});", quote_identifier(table)))?;
    let mut rows = stmt.query([])?;
    let mut columns = Vec::new();
    while let Some(row) = rows.next()? {
        columns.push(row.get::<_, String>(1)?);
    }
    Ok(columns)
}

#[cfg(test)]
mod tests {
    use super::{escape_like, render_where};
    use crate::model::schema::{EntitySchema, FieldSpec, KeyKind};
    use crate::query::filter::{Filter, FilterClause};
    use crate::store::{ReadPlan, StoreError};
    use rusqlite::types::Value;

    fn membros() -> EntitySchema {
        EntitySchema::new("membros", "id", KeyKind::Integer)
            .with_field(FieldSpec::text("nome").contains())
            .with_field(FieldSpec::integer("idade").equals())
    }

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("50%_a\\b"), "50\\%\\_a\\\\b");
    }

    #[test]
    fn render_where_binds_every_value() {
        let schema = membros();
        let filter = Filter::new()
            .with(FilterClause::contains("nome", "Ali"))
            .with(FilterClause::equals("idade", 30));
        let plan = ReadPlan::new(&schema, &filter).with_clause(FilterClause::greater_than("id", 5));

        let (sql, binds) = render_where(&plan).unwrap();
        assert_eq!(
            sql,
            " WHERE 1 = 1 AND pq_lower(\"nome\") LIKE ? ESCAPE '\\' AND \"idade\" = ? AND \"id\" > ?"
        );
        assert_eq!(
            binds,
            vec![
                Value::Text("%ali%".to_string()),
                Value::Integer(30),
                Value::Integer(5)
            ]
        );
    }

    #[test]
    fn render_where_rejects_fields_outside_schema() {
        let schema = membros();
        let filter = Filter::new().with(FilterClause::equals("senha", "x"));
        let plan = ReadPlan::new(&schema, &filter);

        let err = render_where(&plan).unwrap_err();
        assert!(matches!(err, StoreError::UnknownField { field, .. } if field == "senha"));
    }
}
