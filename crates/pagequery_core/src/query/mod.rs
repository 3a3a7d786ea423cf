//! Filter, pagination and request types consumed by the query engine.
//!
//! # Responsibility
//! - Model flat conjunctive filters and the two pagination modes.
//! - Resolve raw caller requests into typed query inputs.
//!
//! # See also
//! - service::query_engine for execution against a record store.

pub mod error;
pub mod filter;
pub mod page;
pub mod request;
