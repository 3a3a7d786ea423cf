//! Caller-facing request shape and its resolution into typed query inputs.
//!
//! # Responsibility
//! - Deserialize the flat `{filters, offset, limit, last_id, page_size, ...}`
//!   request produced by transport layers.
//! - Select the pagination mode and apply request defaults.
//!
//! # Invariants
//! - Offset parameters (`offset`, `limit`, `page`) and cursor parameters
//!   (`last_id`, `page_size`) are never mixed in one request.
//! - Sizes must be positive and offsets non-negative.

use crate::config::EngineLimits;
use crate::model::record::RecordKey;
use crate::model::schema::EntitySchema;
use crate::query::error::{QueryError, QueryResult};
use crate::query::filter::Filter;
use crate::query::page::{PageRequest, SortDirection};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Raw page query as received from a caller.
///
/// Integer fields are signed so negative input can be reported instead of
/// failing deserialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PageQueryRequest {
    pub filters: BTreeMap<String, String>,
    pub offset: Option<i64>,
    pub limit: Option<i64>,
    /// 1-based page number; alternative to `offset`.
    pub page: Option<i64>,
    pub last_id: Option<RecordKey>,
    pub page_size: Option<i64>,
    pub sort_field: Option<String>,
    pub sort_direction: Option<SortDirection>,
}

/// Typed inputs for [`crate::QueryEngine::query_page`].
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuery {
    pub filter: Filter,
    pub page: PageRequest,
    pub sort_field: String,
    pub direction: SortDirection,
}

impl PageQueryRequest {
    /// Resolves this request against `schema`.
    ///
    /// # Errors
    /// - `InvalidArgument` for mixed pagination modes, non-positive sizes,
    ///   negative offsets, page numbers below 1, a `last_id` of the wrong key
    ///   kind, or an unparseable filter value.
    pub fn resolve(&self, schema: &EntitySchema, limits: &EngineLimits) -> QueryResult<ResolvedQuery> {
        let filter = Filter::from_params(
            schema,
            self.filters
                .iter()
                .map(|(name, value)| (name.as_str(), value.as_str())),
        )?;

        Ok(ResolvedQuery {
            filter,
            page: self.page_request(schema, limits)?,
            sort_field: self
                .sort_field
                .clone()
                .unwrap_or_else(|| schema.key_field().to_string()),
            direction: self.sort_direction.unwrap_or_default(),
        })
    }

    fn page_request(&self, schema: &EntitySchema, limits: &EngineLimits) -> QueryResult<PageRequest> {
        let uses_cursor = self.last_id.is_some() || self.page_size.is_some();
        let uses_offset = self.offset.is_some() || self.limit.is_some() || self.page.is_some();

        if uses_cursor && uses_offset {
            return Err(QueryError::invalid(
                "offset pagination (offset/limit/page) and cursor pagination (last_id/page_size) cannot be combined",
            ));
        }

        if uses_cursor {
            if let Some(last_id) = &self.last_id {
                if last_id.kind() != schema.key_kind() {
                    return Err(QueryError::invalid(format!(
                        "last_id `{last_id}` does not match key kind of `{}.{}`",
                        schema.name(),
                        schema.key_field()
                    )));
                }
            }
            let page_size = positive_size("page_size", self.page_size, limits.default_page_size)?;
            return Ok(PageRequest::cursor(self.last_id.clone(), page_size));
        }

        let limit = positive_size("limit", self.limit, limits.default_page_size)?;
        match (self.page, self.offset) {
            (Some(_), Some(_)) => Err(QueryError::invalid(
                "page and offset cannot be combined",
            )),
            (Some(page), None) => {
                let page = u64::try_from(page)
                    .ok()
                    .filter(|page| *page >= 1)
                    .ok_or_else(|| QueryError::invalid(format!("page must be >= 1, got {page}")))?;
                // Page numbers count in applied-size pages.
                PageRequest::page_number(page, limits.clamp(limit))
                    .ok_or_else(|| QueryError::invalid(format!("page {page} is out of range")))
            }
            (None, offset) => {
                let offset = offset.unwrap_or(0);
                let offset = u64::try_from(offset)
                    .map_err(|_| QueryError::invalid(format!("offset must be >= 0, got {offset}")))?;
                Ok(PageRequest::offset(offset, limit))
            }
        }
    }
}

fn positive_size(name: &str, value: Option<i64>, default: u32) -> QueryResult<u32> {
    match value {
        None => Ok(default),
        Some(value) if value < 1 => Err(QueryError::invalid(format!(
            "{name} must be >= 1, got {value}"
        ))),
        Some(value) => Ok(u32::try_from(value).unwrap_or(u32::MAX)),
    }
}
