//! Page requests, page results and paging math.
//!
//! # Invariants
//! - `current_page = offset / limit + 1`.
//! - `total_pages = ceil(total / limit)`; an empty result has zero pages.
//! - Cursor results never carry a total count.

use crate::model::record::{Record, RecordKey};
use serde::{Deserialize, Serialize};

/// Ordering direction for the sort field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    #[default]
    #[serde(alias = "ascending")]
    Asc,
    #[serde(alias = "descending")]
    Desc,
}

impl SortDirection {
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Pagination mode for one query. Exactly one mode is active per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PageRequest {
    /// Skip `offset` matches, return at most `limit`.
    Offset { offset: u64, limit: u32 },
    /// Return at most `page_size` matches strictly after `last_key`.
    ///
    /// `last_key = None` requests the first page.
    Cursor {
        last_key: Option<RecordKey>,
        page_size: u32,
    },
}

impl PageRequest {
    pub fn offset(offset: u64, limit: u32) -> Self {
        Self::Offset { offset, limit }
    }

    pub fn cursor(last_key: Option<RecordKey>, page_size: u32) -> Self {
        Self::Cursor {
            last_key,
            page_size,
        }
    }

    /// Converts a 1-based page number into an offset request.
    ///
    /// Returns `None` when `page` is zero.
    pub fn page_number(page: u64, page_size: u32) -> Option<Self> {
        let offset = page.checked_sub(1)?.checked_mul(u64::from(page_size))?;
        Some(Self::offset(offset, page_size))
    }

    /// Requested limit or page size.
    pub fn size(&self) -> u32 {
        match self {
            Self::Offset { limit, .. } => *limit,
            Self::Cursor { page_size, .. } => *page_size,
        }
    }

    pub fn is_cursor(&self) -> bool {
        matches!(self, Self::Cursor { .. })
    }
}

/// Offset-mode pagination metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OffsetPagination {
    pub total: u64,
    pub current_page: u64,
    pub total_pages: u64,
    pub page_size: u32,
}

impl OffsetPagination {
    pub fn new(total: u64, offset: u64, limit: u32) -> Self {
        Self {
            total,
            current_page: current_page(offset, limit),
            total_pages: total_pages(total, limit),
            page_size: limit,
        }
    }
}

/// Cursor-mode pagination metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CursorPagination {
    /// Key of the final record in the page, `None` for an empty page.
    pub last_id: Option<RecordKey>,
    pub page_size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Pagination {
    Offset(OffsetPagination),
    Cursor(CursorPagination),
}

/// One page of records plus pagination metadata.
///
/// Serializes as `{"data": [...], "pagination": {...}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageResult {
    pub data: Vec<Record>,
    pub pagination: Pagination,
}

impl PageResult {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Offset-mode metadata, `None` for cursor pages.
    pub fn offset_pagination(&self) -> Option<&OffsetPagination> {
        match &self.pagination {
            Pagination::Offset(meta) => Some(meta),
            Pagination::Cursor(_) => None,
        }
    }

    /// Cursor-mode metadata, `None` for offset pages.
    pub fn cursor_pagination(&self) -> Option<&CursorPagination> {
        match &self.pagination {
            Pagination::Cursor(meta) => Some(meta),
            Pagination::Offset(_) => None,
        }
    }

    /// Next cursor to feed back into a cursor request.
    pub fn last_id(&self) -> Option<&RecordKey> {
        self.cursor_pagination()
            .and_then(|meta| meta.last_id.as_ref())
    }
}

/// 1-based page number containing `offset`.
pub fn current_page(offset: u64, limit: u32) -> u64 {
    offset / u64::from(limit.max(1)) + 1
}

/// Number of pages needed for `total` matches. Zero when `total` is zero.
pub fn total_pages(total: u64, limit: u32) -> u64 {
    total.div_ceil(u64::from(limit.max(1)))
}

#[cfg(test)]
mod tests {
    use super::{current_page, total_pages, PageRequest, SortDirection};
    use proptest::prelude::*;

    #[test]
    fn total_pages_has_no_extra_page_on_exact_multiples() {
        assert_eq!(total_pages(20, 10), 2);
        assert_eq!(total_pages(21, 10), 3);
        assert_eq!(total_pages(25, 10), 3);
        assert_eq!(total_pages(0, 10), 0);
    }

    #[test]
    fn current_page_counts_from_one() {
        assert_eq!(current_page(0, 10), 1);
        assert_eq!(current_page(9, 10), 1);
        assert_eq!(current_page(20, 10), 3);
    }

    #[test]
    fn page_number_maps_to_offset() {
        assert_eq!(
            PageRequest::page_number(3, 10),
            Some(PageRequest::offset(20, 10))
        );
        assert_eq!(PageRequest::page_number(0, 10), None);
    }

    #[test]
    fn sort_direction_accepts_long_aliases() {
        let direction: SortDirection = serde_json::from_str("\"descending\"").unwrap();
        assert_eq!(direction, SortDirection::Desc);
    }

    proptest! {
        #[test]
        fn page_math_matches_definitions(total in 0u64..100_000, offset in 0u64..100_000, limit in 1u32..500) {
            let pages = total_pages(total, limit);
            prop_assert!(pages * u64::from(limit) >= total);
            prop_assert!(pages == 0 || (pages - 1) * u64::from(limit) < total);
            prop_assert_eq!(current_page(offset, limit), offset / u64::from(limit) + 1);
        }
    }
}
