//! Record and schema model shared by stores and the query engine.
//!
//! # Responsibility
//! - Define the opaque record shape returned by record stores.
//! - Define typed per-entity schema descriptors used as filter allow-lists.
//!
//! # Invariants
//! - Records carry no cross-entity relationships; stores resolve those.
//! - Every entity is identified by exactly one key field.

pub mod record;
pub mod schema;
