//! Query use-case services.
//!
//! # Responsibility
//! - Execute paginated, filtered reads against caller-supplied stores.
//! - Keep transport layers decoupled from storage details.

pub mod query_engine;
