//! Query-layer error taxonomy.

use crate::store::StoreError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type QueryResult<T> = Result<T, QueryError>;

/// Error returned by page queries and request resolution.
///
/// Surfaced to callers unmodified; the engine never retries.
#[derive(Debug)]
pub enum QueryError {
    /// Bad limit, page size, offset, page number, sort field or filter value.
    InvalidArgument(String),
    /// Cursor pagination was requested on a field other than the unique key.
    UnsupportedCursorField { requested: String, key: String },
    /// Failure reported by the record store.
    Store(StoreError),
}

impl QueryError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Whether the caller sent a request that can never succeed as-is.
    ///
    /// Transport layers map `true` to a client error and `false` to a
    /// server error.
    pub fn is_client_error(&self) -> bool {
        !matches!(self, Self::Store(_))
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::UnsupportedCursorField { requested, key } => write!(
                f,
                "cursor pagination requires sorting by key field `{key}`, got `{requested}`"
            ),
            Self::Store(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Store(err) => Some(err),
            Self::InvalidArgument(_) | Self::UnsupportedCursorField { .. } => None,
        }
    }
}

impl From<StoreError> for QueryError {
    fn from(value: StoreError) -> Self {
        Self::Store(value)
    }
}
