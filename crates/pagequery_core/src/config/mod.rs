//! Entity catalog and engine limits configuration.
//!
//! # Responsibility
//! - Load per-entity schema descriptors and page-size limits from JSON.
//! - Ship the built-in lesson catalog matching the bundled migrations.
//!
//! # Invariants
//! - Every loaded schema has passed `EntitySchema::validate()`.
//! - `1 <= default_page_size <= max_page_size`.
//! - Entity names are unique within one catalog.

use crate::model::schema::{EntitySchema, SchemaError};
use log::info;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

const BUILTIN_CATALOG_JSON: &str = include_str!("lessons_catalog.json");
const DEFAULT_PAGE_SIZE: u32 = 10;
const MAX_PAGE_SIZE: u32 = 100;

pub type SchemaResult<T> = Result<T, SchemaError>;

/// Page-size policy applied by the query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineLimits {
    /// Used when a request omits `limit`/`page_size`.
    pub default_page_size: u32,
    /// Larger requested sizes are clamped to this value.
    pub max_page_size: u32,
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self {
            default_page_size: DEFAULT_PAGE_SIZE,
            max_page_size: MAX_PAGE_SIZE,
        }
    }
}

impl EngineLimits {
    pub fn validate(&self) -> SchemaResult<()> {
        if self.default_page_size == 0 {
            return Err(SchemaError::InvalidLimits(
                "default_page_size must be >= 1".to_string(),
            ));
        }
        if self.max_page_size < self.default_page_size {
            return Err(SchemaError::InvalidLimits(format!(
                "max_page_size {} is below default_page_size {}",
                self.max_page_size, self.default_page_size
            )));
        }
        Ok(())
    }

    /// Clamps a positive requested size to `max_page_size`.
    pub fn clamp(&self, requested: u32) -> u32 {
        requested.min(self.max_page_size)
    }
}

#[derive(Debug, Deserialize)]
struct CatalogConfig {
    #[serde(default)]
    limits: EngineLimits,
    entities: Vec<EntitySchema>,
}

/// Named set of entity schemas plus engine limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    limits: EngineLimits,
    entities: BTreeMap<String, EntitySchema>,
}

impl Catalog {
    pub fn new(limits: EngineLimits, entities: Vec<EntitySchema>) -> SchemaResult<Self> {
        limits.validate()?;

        let mut by_name = BTreeMap::new();
        for schema in entities {
            schema.validate()?;
            let name = schema.name().to_string();
            if by_name.insert(name.clone(), schema).is_some() {
                return Err(SchemaError::DuplicateEntity(name));
            }
        }

        Ok(Self {
            limits,
            entities: by_name,
        })
    }

    /// Parses a catalog document.
    ///
    /// Expected shape:
    /// `{"limits": {...}, "entities": [{"name", "key", "key_kind", "fields"}]}`.
    pub fn from_json_str(json: &str) -> SchemaResult<Self> {
        let config: CatalogConfig = serde_json::from_str(json)?;
        Self::new(config.limits, config.entities)
    }

    /// Reads and parses a catalog file.
    pub fn from_path(path: impl AsRef<Path>) -> SchemaResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        let catalog = Self::from_json_str(&json)?;
        info!(
            "event=catalog_load module=config status=ok source=file entities={} path={}",
            catalog.entities.len(),
            path.display()
        );
        Ok(catalog)
    }

    /// Catalog for the tables created by the bundled migrations.
    pub fn builtin() -> SchemaResult<Self> {
        Self::from_json_str(BUILTIN_CATALOG_JSON)
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySchema> {
        self.entities.get(name)
    }

    pub fn entity_names(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }
}
