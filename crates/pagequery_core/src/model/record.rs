//! Record and field value model.
//!
//! # Responsibility
//! - Define the opaque field map returned by every record store.
//! - Provide the key type used for cursor pagination and point lookups.
//!
//! # Invariants
//! - A record is identified by exactly one key field, named by its schema.
//! - Values compare with a total order: `Null` < numbers < text.

use crate::model::schema::{EntitySchema, KeyKind};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

/// One stored value.
///
/// Serialized untagged so records render as plain JSON objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
}

impl FieldValue {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Text view used by substring matching. Numbers render in decimal.
    pub fn as_search_text(&self) -> Option<String> {
        match self {
            Self::Null => None,
            Self::Integer(value) => Some(value.to_string()),
            Self::Real(value) => Some(value.to_string()),
            Self::Text(value) => Some(value.clone()),
        }
    }

    /// Total order across value kinds.
    ///
    /// Integers and reals compare numerically; `NaN` sorts after every
    /// other number.
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Null, Self::Null) => Ordering::Equal,
            (Self::Null, _) => Ordering::Less,
            (_, Self::Null) => Ordering::Greater,
            (Self::Integer(left), Self::Integer(right)) => left.cmp(right),
            (Self::Integer(left), Self::Real(right)) => (*left as f64).total_cmp(right),
            (Self::Real(left), Self::Integer(right)) => left.total_cmp(&(*right as f64)),
            (Self::Real(left), Self::Real(right)) => left.total_cmp(right),
            (Self::Text(_), Self::Integer(_) | Self::Real(_)) => Ordering::Greater,
            (Self::Integer(_) | Self::Real(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(left), Self::Text(right)) => left.cmp(right),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(i64::from(value))
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Real(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

/// Unique record identifier.
///
/// Integer keys come from auto-increment columns; text keys are opaque
/// store-generated identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RecordKey {
    Integer(i64),
    Text(String),
}

impl RecordKey {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Integer(_) => KeyKind::Integer,
            Self::Text(_) => KeyKind::Text,
        }
    }

    pub fn to_field_value(&self) -> FieldValue {
        match self {
            Self::Integer(value) => FieldValue::Integer(*value),
            Self::Text(value) => FieldValue::Text(value.clone()),
        }
    }

    /// Converts a stored value back into a key, rejecting non-key kinds.
    pub fn from_field_value(value: &FieldValue) -> Option<Self> {
        match value {
            FieldValue::Integer(value) => Some(Self::Integer(*value)),
            FieldValue::Text(value) => Some(Self::Text(value.clone())),
            FieldValue::Null | FieldValue::Real(_) => None,
        }
    }
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{value}"),
            Self::Text(value) => write!(f, "{value}"),
        }
    }
}

/// Opaque field map for one stored entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style setter used by fixtures and import paths.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Returns the value for `field`, or `None` when the field is absent.
    pub fn get(&self, field: &str) -> Option<&FieldValue> {
        self.fields.get(field)
    }

    /// Returns the value for `field`, treating absence as `Null`.
    pub fn value(&self, field: &str) -> &FieldValue {
        self.fields.get(field).unwrap_or(&FieldValue::Null)
    }

    pub fn remove(&mut self, field: &str) -> Option<FieldValue> {
        self.fields.remove(field)
    }

    /// Extracts the unique key named by `schema`.
    ///
    /// Returns `None` when the key field is absent, null, or of the wrong kind.
    pub fn key(&self, schema: &EntitySchema) -> Option<RecordKey> {
        let key = RecordKey::from_field_value(self.get(schema.key_field())?)?;
        (key.kind() == schema.key_kind()).then_some(key)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &FieldValue)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{FieldValue, Record, RecordKey};
    use crate::model::schema::{EntitySchema, FieldSpec, KeyKind};
    use std::cmp::Ordering;

    #[test]
    fn total_cmp_orders_null_numbers_then_text() {
        assert_eq!(
            FieldValue::Null.total_cmp(&FieldValue::Integer(-5)),
            Ordering::Less
        );
        assert_eq!(
            FieldValue::Integer(2).total_cmp(&FieldValue::Real(1.5)),
            Ordering::Greater
        );
        assert_eq!(
            FieldValue::Real(9.0).total_cmp(&FieldValue::Text("a".to_string())),
            Ordering::Less
        );
    }

    #[test]
    fn key_requires_matching_kind() {
        let schema = EntitySchema::new("membros", "id", KeyKind::Integer)
            .with_field(FieldSpec::text("nome"));
        let record = Record::new().with("id", 7).with("nome", "Ana");
        assert_eq!(record.key(&schema), Some(RecordKey::Integer(7)));

        let wrong_kind = Record::new().with("id", "7");
        assert_eq!(wrong_kind.key(&schema), None);
    }

    #[test]
    fn record_serializes_as_plain_object() {
        let record = Record::new()
            .with("id", 1)
            .with("nome", "Ana")
            .with("idade", FieldValue::Null);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(json, r#"{"id":1,"idade":null,"nome":"Ana"}"#);
    }
}
