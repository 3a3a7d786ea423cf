//! Filter clauses and allow-list based filter composition.
//!
//! # Responsibility
//! - Represent flat, AND-combined predicate sets.
//! - Build clauses from raw caller parameters using an entity schema as the
//!   allow-list.
//!
//! # Invariants
//! - Substring needles are stored lower-cased.
//! - Unknown parameter names are ignored, never rejected.
//! - A null stored value never satisfies any clause.

use crate::model::record::{FieldValue, Record};
use crate::model::schema::{EntitySchema, FieldKind, FilterMode};
use crate::query::error::{QueryError, QueryResult};
use log::debug;

/// Comparison applied by one clause.
///
/// `GreaterThan`/`LessThan` are produced internally for cursor seeks; caller
/// requests only produce `Contains` and `Equals`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Predicate {
    Contains,
    Equals,
    GreaterThan,
    LessThan,
}

/// Single `(field, predicate, value)` constraint.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterClause {
    field: String,
    predicate: Predicate,
    value: FieldValue,
}

impl FilterClause {
    /// Case-insensitive substring clause. The needle is lower-cased here.
    pub fn contains(field: impl Into<String>, needle: &str) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::Contains,
            value: FieldValue::Text(needle.to_lowercase()),
        }
    }

    pub fn equals(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::Equals,
            value: value.into(),
        }
    }

    pub fn greater_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::GreaterThan,
            value: value.into(),
        }
    }

    pub fn less_than(field: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        Self {
            field: field.into(),
            predicate: Predicate::LessThan,
            value: value.into(),
        }
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn predicate(&self) -> Predicate {
        self.predicate
    }

    pub fn value(&self) -> &FieldValue {
        &self.value
    }

    /// Evaluates this clause against an in-memory record.
    pub fn matches(&self, record: &Record) -> bool {
        let stored = record.value(&self.field);
        if stored.is_null() || self.value.is_null() {
            return false;
        }

        match self.predicate {
            Predicate::Contains => match (stored.as_search_text(), &self.value) {
                (Some(haystack), FieldValue::Text(needle)) => {
                    haystack.to_lowercase().contains(needle.as_str())
                }
                _ => false,
            },
            Predicate::Equals => stored.total_cmp(&self.value).is_eq(),
            Predicate::GreaterThan => stored.total_cmp(&self.value).is_gt(),
            Predicate::LessThan => stored.total_cmp(&self.value).is_lt(),
        }
    }
}

/// Conjunctive set of clauses. An empty filter matches every record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    clauses: Vec<FilterClause>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, clause: FilterClause) -> Self {
        self.push(clause);
        self
    }

    pub fn push(&mut self, clause: FilterClause) {
        self.clauses.push(clause);
    }

    pub fn clauses(&self) -> &[FilterClause] {
        &self.clauses
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, record: &Record) -> bool {
        self.clauses.iter().all(|clause| clause.matches(record))
    }

    /// Composes a filter from raw `name -> value` parameters.
    ///
    /// Clauses are emitted in schema field order. Parameters naming fields
    /// outside the schema, or fields without a filter mode, are ignored.
    /// Blank values mean "no constraint".
    ///
    /// # Errors
    /// - `InvalidArgument` when an equality value cannot be parsed into the
    ///   field kind.
    pub fn from_params<'a, I>(schema: &EntitySchema, params: I) -> QueryResult<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let params: Vec<(&str, &str)> = params.into_iter().collect();
        let mut filter = Self::new();

        for (name, _) in &params {
            let recognized = schema
                .field(name)
                .is_some_and(|field| field.filter().is_some());
            if !recognized {
                debug!(
                    "event=filter_param_ignored module=query entity={} param={}",
                    schema.name(),
                    name
                );
            }
        }

        for field in schema.fields() {
            let Some(mode) = field.filter() else {
                continue;
            };
            let Some(raw) = params
                .iter()
                .find(|(name, _)| *name == field.name())
                .map(|(_, value)| value.trim())
            else {
                continue;
            };
            if raw.is_empty() {
                continue;
            }

            let clause = match mode {
                FilterMode::Contains => FilterClause::contains(field.name(), raw),
                FilterMode::Equals => {
                    FilterClause::equals(field.name(), parse_value(field.name(), field.kind(), raw)?)
                }
            };
            filter.push(clause);
        }

        Ok(filter)
    }
}

/// Parses a raw parameter into the stored kind of `field`.
pub(crate) fn parse_value(field: &str, kind: FieldKind, raw: &str) -> QueryResult<FieldValue> {
    match kind {
        FieldKind::Text => Ok(FieldValue::Text(raw.to_string())),
        FieldKind::Integer => raw.parse::<i64>().map(FieldValue::Integer).map_err(|_| {
            QueryError::invalid(format!("filter `{field}` expects an integer, got `{raw}`"))
        }),
        FieldKind::Real => raw
            .parse::<f64>()
            .ok()
            .filter(|value| value.is_finite())
            .map(FieldValue::Real)
            .ok_or_else(|| {
                QueryError::invalid(format!("filter `{field}` expects a number, got `{raw}`"))
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::{Filter, FilterClause, Predicate};
    use crate::model::record::{FieldValue, Record};
    use crate::model::schema::{EntitySchema, FieldSpec, KeyKind};
    use crate::query::error::QueryError;

    fn membros() -> EntitySchema {
        EntitySchema::new("membros", "id", KeyKind::Integer)
            .with_field(FieldSpec::text("nome").contains())
            .with_field(FieldSpec::text("email").contains())
            .with_field(FieldSpec::integer("idade").equals())
            .with_field(FieldSpec::text("bio"))
    }

    #[test]
    fn from_params_follows_schema_order_and_ignores_unknown_fields() {
        let params = [
            ("idade", "30"),
            ("nome", "ALI"),
            ("senha", "x"),
            ("bio", "ignored without filter mode"),
        ];
        let filter = Filter::from_params(&membros(), params).unwrap();

        assert_eq!(filter.clauses().len(), 2);
        assert_eq!(filter.clauses()[0].field(), "nome");
        assert_eq!(filter.clauses()[0].predicate(), Predicate::Contains);
        assert_eq!(
            filter.clauses()[0].value(),
            &FieldValue::Text("ali".to_string())
        );
        assert_eq!(filter.clauses()[1].value(), &FieldValue::Integer(30));
    }

    #[test]
    fn from_params_treats_blank_values_as_absent() {
        let filter = Filter::from_params(&membros(), [("nome", "  "), ("email", "")]).unwrap();
        assert!(filter.is_empty());
    }

    #[test]
    fn from_params_rejects_unparseable_equality_value() {
        let err = Filter::from_params(&membros(), [("idade", "trinta")]).unwrap_err();
        assert!(matches!(err, QueryError::InvalidArgument(_)));
    }

    #[test]
    fn clauses_never_match_null_values() {
        let record = Record::new().with("id", 1).with("idade", FieldValue::Null);
        assert!(!FilterClause::equals("idade", 30).matches(&record));
        assert!(!FilterClause::greater_than("idade", 0).matches(&record));
        assert!(!FilterClause::contains("nome", "a").matches(&record));
    }

    #[test]
    fn contains_is_case_insensitive() {
        let record = Record::new().with("nome", "Álvaro ALIENS");
        assert!(FilterClause::contains("nome", "aliens").matches(&record));
        assert!(FilterClause::contains("nome", "álv").matches(&record));
    }
}
