//! Paginated query engine.
//!
//! # Responsibility
//! - Translate `(filter, page request, sort)` into reads against a record
//!   store and shape the `PageResult`.
//! - Own page-size policy (`EngineLimits`) and argument validation.
//!
//! # Invariants
//! - Offset mode issues exactly two reads (count, then page); cursor mode
//!   issues exactly one and never counts.
//! - Cursor mode only sorts by the entity key, so "next page" is a strict
//!   key comparison.
//! - The engine holds no store handle and no mutable state between calls.

use crate::config::{Catalog, EngineLimits};
use crate::model::schema::EntitySchema;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::{Filter, FilterClause};
use crate::query::page::{
    CursorPagination, OffsetPagination, PageRequest, PageResult, Pagination, SortDirection,
};
use crate::query::request::PageQueryRequest;
use crate::store::{GroupCount, ReadPlan, RecordStore};
use log::{debug, error, info, warn};
use std::time::Instant;

/// Stateless page query executor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryEngine {
    limits: EngineLimits,
}

impl QueryEngine {
    pub fn new(limits: EngineLimits) -> Self {
        Self { limits }
    }

    pub fn from_catalog(catalog: &Catalog) -> Self {
        Self::new(*catalog.limits())
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    /// Runs one page query against `store`.
    ///
    /// Filter clauses naming fields outside `schema` are dropped. Requested
    /// sizes above `max_page_size` are clamped; the applied size is reported
    /// as `page_size`.
    ///
    /// # Errors
    /// - `InvalidArgument` when the limit/page size is zero, the sort field is
    ///   unknown or unsortable, or `last_key` has the wrong key kind.
    /// - `UnsupportedCursorField` when cursor mode sorts by a non-key field.
    /// - `Store` when a store read fails.
    pub fn query_page<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        schema: &EntitySchema,
        filter: &Filter,
        page: &PageRequest,
        sort_field: &str,
        direction: SortDirection,
    ) -> QueryResult<PageResult> {
        let started_at = Instant::now();
        let mode = if page.is_cursor() { "cursor" } else { "offset" };
        let filter = recognized_filter(schema, filter);
        let result = self.run_page(store, schema, &filter, page, sort_field, direction);

        match &result {
            Ok(page_result) => info!(
                "event=query_page module=engine status=ok mode={} entity={} clauses={} rows={} duration_ms={}",
                mode,
                schema.name(),
                filter.clauses().len(),
                page_result.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("query_page", mode, schema, err, started_at),
        }

        result
    }

    /// Resolves a caller request and runs it.
    pub fn query_request<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        schema: &EntitySchema,
        request: &PageQueryRequest,
    ) -> QueryResult<PageResult> {
        let resolved = request.resolve(schema, &self.limits).inspect_err(|err| {
            warn!(
                "event=query_request module=engine status=error entity={} error_code=invalid_request error={}",
                schema.name(),
                err
            );
        })?;

        self.query_page(
            store,
            schema,
            &resolved.filter,
            &resolved.page,
            &resolved.sort_field,
            resolved.direction,
        )
    }

    /// Counts filtered records grouped by `group_field`.
    ///
    /// Keeps groups with at least `min_count` members, ordered by count
    /// descending then value ascending.
    pub fn count_by<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        schema: &EntitySchema,
        filter: &Filter,
        group_field: &str,
        min_count: u64,
    ) -> QueryResult<Vec<GroupCount>> {
        let started_at = Instant::now();
        let result = (|| {
            if schema.field(group_field).is_none() {
                return Err(QueryError::invalid(format!(
                    "unknown group field `{group_field}` for entity `{}`",
                    schema.name()
                )));
            }
            let plan = ReadPlan::new(schema, &recognized_filter(schema, filter));
            Ok(store.group_count(&plan, group_field, min_count)?)
        })();

        match &result {
            Ok(groups) => info!(
                "event=count_by module=engine status=ok entity={} field={} groups={} duration_ms={}",
                schema.name(),
                group_field,
                groups.len(),
                started_at.elapsed().as_millis()
            ),
            Err(err) => log_failure("count_by", "group", schema, err, started_at),
        }

        result
    }

    fn run_page<S: RecordStore + ?Sized>(
        &self,
        store: &S,
        schema: &EntitySchema,
        filter: &Filter,
        page: &PageRequest,
        sort_field: &str,
        direction: SortDirection,
    ) -> QueryResult<PageResult> {
        let requested = page.size();
        if requested == 0 {
            let name = if page.is_cursor() { "page_size" } else { "limit" };
            return Err(QueryError::invalid(format!("{name} must be >= 1, got 0")));
        }
        let applied = self.limits.clamp(requested);

        match page {
            PageRequest::Offset { offset, .. } => {
                check_sort_field(schema, sort_field)?;
                let plan = ReadPlan::new(schema, filter);
                let total = store.count(&plan)?;
                let data = store.fetch(
                    &plan
                        .order_by(sort_field, direction)
                        .skip(*offset)
                        .take(u64::from(applied)),
                )?;

                Ok(PageResult {
                    data,
                    pagination: Pagination::Offset(OffsetPagination::new(total, *offset, applied)),
                })
            }
            PageRequest::Cursor { last_key, .. } => {
                if !schema.is_key(sort_field) {
                    return Err(QueryError::UnsupportedCursorField {
                        requested: sort_field.to_string(),
                        key: schema.key_field().to_string(),
                    });
                }

                let mut plan = ReadPlan::new(schema, filter)
                    .order_by(sort_field, direction)
                    .take(u64::from(applied));
                if let Some(last_key) = last_key {
                    if last_key.kind() != schema.key_kind() {
                        return Err(QueryError::invalid(format!(
                            "last_id `{last_key}` does not match key kind of `{}.{}`",
                            schema.name(),
                            schema.key_field()
                        )));
                    }
                    let bound = last_key.to_field_value();
                    plan = plan.with_clause(match direction {
                        SortDirection::Asc => FilterClause::greater_than(sort_field, bound),
                        SortDirection::Desc => FilterClause::less_than(sort_field, bound),
                    });
                }

                let data = store.fetch(&plan)?;
                let last_id = data.last().and_then(|record| record.key(schema));
                Ok(PageResult {
                    data,
                    pagination: Pagination::Cursor(CursorPagination {
                        last_id,
                        page_size: applied,
                    }),
                })
            }
        }
    }
}

/// Drops clauses that name fields outside the schema allow-list.
fn recognized_filter(schema: &EntitySchema, filter: &Filter) -> Filter {
    let mut recognized = Filter::new();
    for clause in filter.clauses() {
        if schema.field(clause.field()).is_some() {
            recognized.push(clause.clone());
        } else {
            debug!(
                "event=filter_clause_ignored module=engine entity={} field={}",
                schema.name(),
                clause.field()
            );
        }
    }
    recognized
}

fn check_sort_field(schema: &EntitySchema, sort_field: &str) -> QueryResult<()> {
    match schema.field(sort_field) {
        Some(field) if field.sortable() => Ok(()),
        Some(_) => Err(QueryError::invalid(format!(
            "field `{sort_field}` of entity `{}` is not sortable",
            schema.name()
        ))),
        None => Err(QueryError::invalid(format!(
            "unknown sort field `{sort_field}` for entity `{}`",
            schema.name()
        ))),
    }
}

fn log_failure(
    event: &str,
    mode: &str,
    schema: &EntitySchema,
    err: &QueryError,
    started_at: Instant,
) {
    if err.is_client_error() {
        warn!(
            "event={} module=engine status=error mode={} entity={} duration_ms={} error_code=invalid_query error={}",
            event,
            mode,
            schema.name(),
            started_at.elapsed().as_millis(),
            err
        );
    } else {
        error!(
            "event={} module=engine status=error mode={} entity={} duration_ms={} error_code=store_failed error={}",
            event,
            mode,
            schema.name(),
            started_at.elapsed().as_millis(),
            err
        );
    }
}

#[cfg(test)]
mod tests {
    use super::{recognized_filter, QueryEngine};
    use crate::config::EngineLimits;
    use crate::model::record::Record;
    use crate::model::schema::{EntitySchema, FieldSpec, KeyKind};
    use crate::query::error::QueryError;
    use crate::query::filter::{Filter, FilterClause};
    use crate::query::page::{PageRequest, SortDirection};
    use crate::store::{MemoryRecordStore, RecordWriter};

    fn membros() -> EntitySchema {
        EntitySchema::new("membros", "id", KeyKind::Integer)
            .with_field(FieldSpec::text("nome").contains())
            .with_field(FieldSpec::text("bio").unsortable())
    }

    #[test]
    fn engine_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<QueryEngine>();
    }

    #[test]
    fn recognized_filter_drops_unknown_fields() {
        let filter = Filter::new()
            .with(FilterClause::contains("nome", "a"))
            .with(FilterClause::equals("senha", "x"));
        let recognized = recognized_filter(&membros(), &filter);
        assert_eq!(recognized.clauses().len(), 1);
        assert_eq!(recognized.clauses()[0].field(), "nome");
    }

    #[test]
    fn unknown_filter_fields_never_reach_the_store() {
        let engine = QueryEngine::default();
        let mut store = MemoryRecordStore::new();
        let schema = membros();
        store
            .insert(&schema, &Record::new().with("nome", "Ana"))
            .unwrap();
        let filter = Filter::new()
            .with(FilterClause::contains("nome", "an"))
            .with(FilterClause::equals("senha", "x"));

        for page in [PageRequest::offset(0, 10), PageRequest::cursor(None, 10)] {
            let result = engine
                .query_page(&store, &schema, &filter, &page, "id", SortDirection::Asc)
                .unwrap();
            assert_eq!(result.len(), 1);
        }
    }

    #[test]
    fn zero_sizes_are_invalid_in_both_modes() {
        let engine = QueryEngine::default();
        let store = MemoryRecordStore::new();
        let schema = membros();

        for page in [PageRequest::offset(0, 0), PageRequest::cursor(None, 0)] {
            let err = engine
                .query_page(&store, &schema, &Filter::new(), &page, "id", SortDirection::Asc)
                .unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)));
        }
    }

    #[test]
    fn unsortable_and_unknown_sort_fields_are_invalid() {
        let engine = QueryEngine::default();
        let store = MemoryRecordStore::new();
        let schema = membros();
        let page = PageRequest::offset(0, 10);

        for field in ["bio", "senha"] {
            let err = engine
                .query_page(&store, &schema, &Filter::new(), &page, field, SortDirection::Asc)
                .unwrap_err();
            assert!(matches!(err, QueryError::InvalidArgument(_)), "{field}");
        }
    }

    #[test]
    fn oversized_limits_are_clamped_and_reported() {
        let engine = QueryEngine::new(EngineLimits {
            default_page_size: 5,
            max_page_size: 20,
        });
        let store = MemoryRecordStore::new();
        let page = engine
            .query_page(
                &store,
                &membros(),
                &Filter::new(),
                &PageRequest::offset(0, 500),
                "id",
                SortDirection::Asc,
            )
            .unwrap();
        assert_eq!(page.offset_pagination().unwrap().page_size, 20);
    }
}
