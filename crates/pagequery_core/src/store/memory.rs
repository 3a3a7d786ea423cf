//! In-memory document-style record store.
//!
//! # Responsibility
//! - Hold records per collection and evaluate plans against field maps,
//!   the way a document database evaluates a query document.
//!
//! # Invariants
//! - Integer keys are never reused after deletion within one store.
//! - Ordering matches the SQLite store: sort field, then key ascending,
//!   with `Null` before numbers before text.
//! - Substring matching lower-cases with full Unicode rules.

use crate::model::record::{FieldValue, Record, RecordKey};
use crate::model::schema::{EntitySchema, KeyKind};
use crate::query::page::SortDirection;
use crate::store::{
    check_key_kind, prepare_insert, GroupCount, ReadPlan, RecordStore, RecordWriter, StoreError,
    StoreResult,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Default)]
struct Collection {
    records: BTreeMap<RecordKey, Record>,
    last_integer_key: i64,
}

/// Record store keeping every collection in process memory.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    collections: BTreeMap<String, Collection>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of records held for `schema`.
    pub fn len(&self, schema: &EntitySchema) -> usize {
        self.collections
            .get(schema.name())
            .map_or(0, |collection| collection.records.len())
    }

    pub fn is_empty(&self, schema: &EntitySchema) -> bool {
        self.len(schema) == 0
    }

    fn matching<'s>(&'s self, plan: &ReadPlan<'_>) -> StoreResult<Vec<(&'s RecordKey, &'s Record)>> {
        plan.validate()?;
        let Some(collection) = self.collections.get(plan.schema.name()) else {
            return Ok(Vec::new());
        };

        Ok(collection
            .records
            .iter()
            .filter(|(_, record)| plan.clauses.iter().all(|clause| clause.matches(record)))
            .collect())
    }
}

impl RecordStore for MemoryRecordStore {
    fn count(&self, plan: &ReadPlan<'_>) -> StoreResult<u64> {
        Ok(self.matching(plan)?.len() as u64)
    }

    fn fetch(&self, plan: &ReadPlan<'_>) -> StoreResult<Vec<Record>> {
        let mut matches = self.matching(plan)?;

        if let Some(order) = &plan.order {
            matches.sort_by(|(left_key, left), (right_key, right)| {
                let by_field = left.value(&order.field).total_cmp(right.value(&order.field));
                let by_field = match order.direction {
                    SortDirection::Asc => by_field,
                    SortDirection::Desc => by_field.reverse(),
                };
                if plan.schema.is_key(&order.field) {
                    by_field
                } else {
                    by_field.then_with(|| left_key.cmp(right_key))
                }
            });
        }

        let skip = usize::try_from(plan.skip).unwrap_or(usize::MAX);
        let take = plan
            .take
            .map_or(usize::MAX, |take| usize::try_from(take).unwrap_or(usize::MAX));

        Ok(matches
            .into_iter()
            .skip(skip)
            .take(take)
            .map(|(_, record)| record.clone())
            .collect())
    }

    fn group_count(
        &self,
        plan: &ReadPlan<'_>,
        field: &str,
        min_count: u64,
    ) -> StoreResult<Vec<GroupCount>> {
        plan.field(field)?;
        let mut values: Vec<&FieldValue> = self
            .matching(plan)?
            .into_iter()
            .map(|(_, record)| record.value(field))
            .collect();
        values.sort_by(|left, right| left.total_cmp(right));

        let mut groups: Vec<GroupCount> = Vec::new();
        for value in values {
            match groups.last_mut() {
                Some(group) if group.value.total_cmp(value) == Ordering::Equal => group.count += 1,
                _ => groups.push(GroupCount {
                    value: value.clone(),
                    count: 1,
                }),
            }
        }

        groups.retain(|group| group.count >= min_count);
        // Stable sort keeps value-ascending order within equal counts.
        groups.sort_by(|left, right| right.count.cmp(&left.count));
        Ok(groups)
    }

    fn get(&self, schema: &EntitySchema, key: &RecordKey) -> StoreResult<Option<Record>> {
        check_key_kind(schema, key)?;
        Ok(self
            .collections
            .get(schema.name())
            .and_then(|collection| collection.records.get(key))
            .cloned())
    }
}

impl RecordWriter for MemoryRecordStore {
    fn insert(&mut self, schema: &EntitySchema, record: &Record) -> StoreResult<RecordKey> {
        let provided_key = prepare_insert(schema, record)?;
        let collection = self.collections.entry(schema.name().to_string()).or_default();

        let key = match (provided_key, schema.key_kind()) {
            (Some(key), _) => key,
            (None, KeyKind::Integer) => RecordKey::Integer(collection.last_integer_key + 1),
            (None, KeyKind::Text) => RecordKey::Text(Uuid::new_v4().to_string()),
        };
        if collection.records.contains_key(&key) {
            return Err(StoreError::DuplicateKey {
                entity: schema.name().to_string(),
                key,
            });
        }
        if let RecordKey::Integer(value) = key {
            collection.last_integer_key = collection.last_integer_key.max(value);
        }

        let mut stored = Record::new();
        for field in schema.fields() {
            stored.set(field.name(), record.value(field.name()).clone());
        }
        stored.set(schema.key_field(), key.to_field_value());
        collection.records.insert(key.clone(), stored);

        Ok(key)
    }

    fn delete_by_key(&mut self, schema: &EntitySchema, key: &RecordKey) -> StoreResult<bool> {
        check_key_kind(schema, key)?;
        Ok(self
            .collections
            .get_mut(schema.name())
            .is_some_and(|collection| collection.records.remove(key).is_some()))
    }
}
