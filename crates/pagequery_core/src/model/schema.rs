//! Typed per-entity schema descriptors.
//!
//! # Responsibility
//! - Describe which fields an entity exposes, their value kinds, and which
//!   predicate each field accepts in filter requests.
//! - Act as the allow-list for filter composition and sort fields.
//!
//! # Invariants
//! - Entity and field names are plain SQL identifiers.
//! - The key field is always the first field and accepts equality filters.
//! - Substring filters are only allowed on text fields.
//!
//! # See also
//! - config::Catalog for loading schemas from JSON.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

static IDENTIFIER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Key column kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Auto-incrementing integer key.
    Integer,
    /// Store-generated opaque string key.
    Text,
}

impl KeyKind {
    pub fn field_kind(self) -> FieldKind {
        match self {
            Self::Integer => FieldKind::Integer,
            Self::Text => FieldKind::Text,
        }
    }
}

/// Stored value kind for one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Integer,
    Real,
    Text,
}

/// Predicate a field accepts in caller filter requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    /// Case-insensitive substring match. Text fields only.
    Contains,
    /// Exact equality after parsing into the field kind.
    Equals,
}

/// One field in an entity schema.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct FieldSpec {
    name: String,
    kind: FieldKind,
    #[serde(default)]
    filter: Option<FilterMode>,
    #[serde(default = "default_sortable")]
    sortable: bool,
}

fn default_sortable() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            filter: None,
            sortable: true,
        }
    }

    pub fn text(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Text)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Integer)
    }

    pub fn real(name: impl Into<String>) -> Self {
        Self::new(name, FieldKind::Real)
    }

    /// Accepts case-insensitive substring filters.
    pub fn contains(mut self) -> Self {
        self.filter = Some(FilterMode::Contains);
        self
    }

    /// Accepts exact equality filters.
    pub fn equals(mut self) -> Self {
        self.filter = Some(FilterMode::Equals);
        self
    }

    pub fn unsortable(mut self) -> Self {
        self.sortable = false;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn filter(&self) -> Option<FilterMode> {
        self.filter
    }

    pub fn sortable(&self) -> bool {
        self.sortable
    }
}

/// Schema descriptor for one entity (SQL table or document collection).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "EntitySchemaConfig")]
pub struct EntitySchema {
    name: String,
    key_field: String,
    key_kind: KeyKind,
    fields: Vec<FieldSpec>,
}

/// Serialized form: `fields` lists every non-key field.
#[derive(Debug, Deserialize)]
struct EntitySchemaConfig {
    name: String,
    key: String,
    key_kind: KeyKind,
    #[serde(default)]
    fields: Vec<FieldSpec>,
}

impl TryFrom<EntitySchemaConfig> for EntitySchema {
    type Error = SchemaError;

    fn try_from(value: EntitySchemaConfig) -> Result<Self, Self::Error> {
        let schema = value
            .fields
            .into_iter()
            .fold(Self::new(value.name, value.key, value.key_kind), Self::with_field);
        schema.validate()?;
        Ok(schema)
    }
}

impl EntitySchema {
    /// Creates a schema holding only the key field.
    ///
    /// Call [`EntitySchema::validate`] after adding fields; config loading
    /// does this automatically.
    pub fn new(name: impl Into<String>, key_field: impl Into<String>, key_kind: KeyKind) -> Self {
        let key_field = key_field.into();
        let key_spec = FieldSpec::new(key_field.clone(), key_kind.field_kind()).equals();
        Self {
            name: name.into(),
            key_field,
            key_kind,
            fields: vec![key_spec],
        }
    }

    pub fn with_field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// Entity name. Used as the SQL table name or collection name.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_field(&self) -> &str {
        &self.key_field
    }

    pub fn key_kind(&self) -> KeyKind {
        self.key_kind
    }

    /// All fields, key first.
    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn is_key(&self, name: &str) -> bool {
        self.key_field == name
    }

    /// Checks identifiers, duplicates and predicate/kind compatibility.
    pub fn validate(&self) -> Result<(), SchemaError> {
        validate_identifier(&self.name)?;

        let mut seen = BTreeSet::new();
        for field in &self.fields {
            validate_identifier(&field.name)?;
            if !seen.insert(field.name.as_str()) {
                return Err(SchemaError::DuplicateField {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                });
            }
            if field.filter == Some(FilterMode::Contains) && field.kind != FieldKind::Text {
                return Err(SchemaError::InvalidFilterMode {
                    entity: self.name.clone(),
                    field: field.name.clone(),
                });
            }
        }

        Ok(())
    }
}

/// Returns whether `value` is a plain identifier safe to splice into SQL.
pub fn is_identifier(value: &str) -> bool {
    IDENTIFIER_RE.is_match(value)
}

fn validate_identifier(value: &str) -> Result<(), SchemaError> {
    if is_identifier(value) {
        Ok(())
    } else {
        Err(SchemaError::InvalidIdentifier(value.to_string()))
    }
}

/// Schema or catalog configuration error.
#[derive(Debug)]
pub enum SchemaError {
    InvalidIdentifier(String),
    DuplicateField { entity: String, field: String },
    InvalidFilterMode { entity: String, field: String },
    DuplicateEntity(String),
    InvalidLimits(String),
    Io(std::io::Error),
    Parse(serde_json::Error),
}

impl Display for SchemaError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidIdentifier(value) => write!(f, "invalid identifier `{value}`"),
            Self::DuplicateField { entity, field } => {
                write!(f, "duplicate field `{field}` in entity `{entity}`")
            }
            Self::InvalidFilterMode { entity, field } => write!(
                f,
                "substring filter requires a text field: `{entity}.{field}`"
            ),
            Self::DuplicateEntity(name) => write!(f, "duplicate entity `{name}` in catalog"),
            Self::InvalidLimits(message) => write!(f, "invalid page limits: {message}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Parse(err) => write!(f, "invalid catalog json: {err}"),
        }
    }
}

impl Error for SchemaError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}
