//! In-memory storage engine
//!
//! Evaluates the full filter language (including paths through relations),
//! sorting, free-text search and windowing over rows kept in memory.
//! Ids are allocated from a per-content-type counter starting at 1.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use type_mapping::EntityId;

use super::{Mutation, QueryDescriptor, QueryOutcome, RawRecord, StorageEngine};
use crate::errors::StorageError;
use crate::params::{FilterExpression, FilterOperator, LogicalOperator, SortEntry, SortOrder};
use crate::schema::{AttributeDefinition, SchemaRegistry};

#[derive(Debug, Default)]
struct Table {
    last_id: i64,
    rows: BTreeMap<i64, Map<String, Value>>,
}

type Tables = HashMap<String, Table>;

#[derive(Debug)]
pub struct InMemoryStorage {
    registry: Arc<SchemaRegistry>,
    tables: RwLock<Tables>,
}

impl InMemoryStorage {
    pub fn new(registry: Arc<SchemaRegistry>) -> Self {
        Self {
            registry,
            tables: RwLock::new(HashMap::new()),
        }
    }

    /// Insert a row as-is, allocating the next id
    pub fn seed(&self, uid: &str, values: Value) -> Result<EntityId, StorageError> {
        let values = into_row(values)?;
        let mut tables = self.write()?;
        let table = self.table_mut(&mut tables, uid)?;
        table.last_id += 1;
        let id = table.last_id;
        table.rows.insert(id, values);
        Ok(EntityId::Numeric(id))
    }

    /// Insert a row as-is under a chosen id, replacing any existing row
    pub fn seed_with_id(&self, uid: &str, id: i64, values: Value) -> Result<(), StorageError> {
        let values = into_row(values)?;
        let mut tables = self.write()?;
        let table = self.table_mut(&mut tables, uid)?;
        table.last_id = table.last_id.max(id);
        table.rows.insert(id, values);
        Ok(())
    }

    /// Raw stored values of one row
    pub fn row(&self, uid: &str, id: &EntityId) -> Option<Map<String, Value>> {
        let tables = self.read().ok()?;
        let id = numeric_id(id)?;
        tables.get(uid)?.rows.get(&id).cloned()
    }

    /// Number of rows stored for a content type
    pub fn len(&self, uid: &str) -> usize {
        self.read()
            .map(|tables| tables.get(uid).map_or(0, |t| t.rows.len()))
            .unwrap_or(0)
    }

    pub fn is_empty(&self, uid: &str) -> bool {
        self.len(uid) == 0
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StorageError> {
        self.tables
            .read()
            .map_err(|_| StorageError::new("in-memory storage lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StorageError> {
        self.tables
            .write()
            .map_err(|_| StorageError::new("in-memory storage lock poisoned"))
    }

    fn table_mut<'t>(&self, tables: &'t mut Tables, uid: &str) -> Result<&'t mut Table, StorageError> {
        if !self.registry.contains(uid) {
            return Err(StorageError::new(format!("unknown content type '{}'", uid)));
        }
        Ok(tables.entry(uid.to_string()).or_default())
    }
}

#[async_trait]
impl StorageEngine for InMemoryStorage {
    async fn execute(&self, uid: &str, query: &QueryDescriptor) -> Result<QueryOutcome, StorageError> {
        if !self.registry.contains(uid) {
            return Err(StorageError::new(format!("unknown content type '{}'", uid)));
        }
        let tables = self.read()?;
        let Some(table) = tables.get(uid) else {
            return Ok(QueryOutcome::default());
        };

        let eval = Evaluator {
            registry: &self.registry,
            tables: &tables,
        };

        let mut matched: Vec<(i64, &Map<String, Value>)> = table
            .rows
            .iter()
            .map(|(id, row)| (*id, row))
            .filter(|(id, row)| {
                query
                    .filters
                    .as_ref()
                    .map_or(true, |filter| eval.matches(uid, *id, row, filter))
            })
            .filter(|(id, row)| {
                query
                    .search
                    .as_deref()
                    .map_or(true, |q| eval.search(uid, *id, row, q))
            })
            .collect();

        if !query.sort.is_empty() {
            matched.sort_by(|a, b| eval.compare(uid, *a, *b, &query.sort));
        }

        let total = matched.len() as u64;
        let offset = query.offset.unwrap_or(0) as usize;
        let limit = query.limit.map_or(usize::MAX, |l| l as usize);

        let records = matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|(id, row)| RawRecord::new(id, project(row, query.fields.as_deref())))
            .collect();

        Ok(QueryOutcome { records, total })
    }

    async fn execute_mutation(
        &self,
        uid: &str,
        mutation: Mutation,
    ) -> Result<Option<RawRecord>, StorageError> {
        let mut tables = self.write()?;
        let table = self.table_mut(&mut tables, uid)?;

        let record = match mutation {
            Mutation::Create { data } => {
                table.last_id += 1;
                let id = table.last_id;
                let values = data.into_map();
                table.rows.insert(id, values.clone());
                Some(RawRecord::new(id, values))
            }
            Mutation::Update { id, data } => numeric_id(&id)
                .and_then(|id| table.rows.get_mut(&id).map(|row| (id, row)))
                .map(|(id, row)| {
                    for (attribute, value) in data.into_map() {
                        row.insert(attribute, value);
                    }
                    RawRecord::new(id, row.clone())
                }),
            Mutation::Delete { id } => numeric_id(&id)
                .and_then(|id| table.rows.remove(&id).map(|row| RawRecord::new(id, row))),
        };
        Ok(record)
    }
}

fn into_row(values: Value) -> Result<Map<String, Value>, StorageError> {
    match values {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(StorageError::new("rows must be JSON objects")),
    }
}

fn numeric_id(id: &EntityId) -> Option<i64> {
    match id {
        EntityId::Numeric(n) => Some(*n),
        EntityId::String(s) => s.parse().ok(),
    }
}

fn project(row: &Map<String, Value>, fields: Option<&[String]>) -> Map<String, Value> {
    match fields {
        None => row.clone(),
        Some(fields) => row
            .iter()
            .filter(|(key, _)| fields.contains(*key))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect(),
    }
}

/// Ids referenced by a stored relation value
fn related_ids(value: Option<&Value>) -> Vec<i64> {
    fn one(value: &Value) -> Option<i64> {
        match value {
            Value::Object(map) => map.get("id").and_then(one),
            other => EntityId::from_value(other).as_ref().and_then(numeric_id),
        }
    }

    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(single) => one(single).into_iter().collect(),
    }
}

struct Evaluator<'a> {
    registry: &'a SchemaRegistry,
    tables: &'a Tables,
}

impl<'a> Evaluator<'a> {
    fn matches(&self, uid: &str, id: i64, row: &Map<String, Value>, filter: &FilterExpression) -> bool {
        match filter {
            FilterExpression::Condition(condition) => {
                let mut values = self.values_at(uid, id, row, &condition.path);
                if values.is_empty() {
                    values.push(Value::Null);
                }
                values
                    .iter()
                    .any(|candidate| evaluate(condition.operator, candidate, &condition.value))
            }
            FilterExpression::Group { operator, filters } => match operator {
                LogicalOperator::And => filters.iter().all(|f| self.matches(uid, id, row, f)),
                LogicalOperator::Or => filters.iter().any(|f| self.matches(uid, id, row, f)),
            },
            FilterExpression::Not(inner) => !self.matches(uid, id, row, inner),
        }
    }

    /// Values reachable from a row along an attribute path
    fn values_at(&self, uid: &str, id: i64, row: &Map<String, Value>, path: &[String]) -> Vec<Value> {
        let Some((head, rest)) = path.split_first() else {
            return Vec::new();
        };
        if head == "id" {
            return vec![Value::from(id)];
        }

        let definition = self
            .registry
            .try_get(uid)
            .and_then(|schema| schema.attribute_def(head));

        match definition {
            Some(AttributeDefinition::Relation { target, .. }) if !rest.is_empty() => {
                let Some(table) = self.tables.get(target) else {
                    return Vec::new();
                };
                related_ids(row.get(head))
                    .into_iter()
                    .filter_map(|rid| table.rows.get(&rid).map(|trow| (rid, trow)))
                    .flat_map(|(rid, trow)| self.values_at(target, rid, trow, rest))
                    .collect()
            }
            _ => vec![row.get(head).cloned().unwrap_or(Value::Null)],
        }
    }

    fn search(&self, uid: &str, id: i64, row: &Map<String, Value>, query: &str) -> bool {
        let needle = query.to_lowercase();
        if needle.parse::<i64>().ok() == Some(id) {
            return true;
        }
        let Some(schema) = self.registry.try_get(uid) else {
            return false;
        };
        schema
            .scalar_attributes()
            .filter(|(_, def)| def.scalar_type().is_some_and(type_mapping::is_text_searchable))
            .filter_map(|(name, _)| row.get(name).and_then(Value::as_str))
            .any(|text| text.to_lowercase().contains(&needle))
    }

    fn compare(
        &self,
        uid: &str,
        a: (i64, &Map<String, Value>),
        b: (i64, &Map<String, Value>),
        sort: &[SortEntry],
    ) -> Ordering {
        for entry in sort {
            let first = |(id, row): (i64, &Map<String, Value>)| {
                self.values_at(uid, id, row, &entry.path)
                    .into_iter()
                    .next()
                    .unwrap_or(Value::Null)
            };
            let ordering = compare_values(&first(a), &first(b));
            let ordering = match entry.order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    }
}

fn rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order used for sorting: null first, then by kind, then by value
fn compare_values(a: &Value, b: &Value) -> Ordering {
    ordered(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

/// Comparison between values of the same kind
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn text_pair(candidate: &Value, operand: &Value, fold: bool) -> Option<(String, String)> {
    let (a, b) = (text(candidate)?, text(operand)?);
    Some(if fold {
        (a.to_lowercase(), b.to_lowercase())
    } else {
        (a, b)
    })
}

fn evaluate(operator: FilterOperator, candidate: &Value, operand: &Value) -> bool {
    use FilterOperator::*;

    let textual = |fold: bool, test: fn(&str, &str) -> bool| {
        text_pair(candidate, operand, fold).is_some_and(|(a, b)| test(&a, &b))
    };

    match operator {
        Eq => loose_eq(candidate, operand),
        Ne => !loose_eq(candidate, operand),
        Eqi => textual(true, |a, b| a == b),
        Nei => !textual(true, |a, b| a == b),
        Lt => ordered(candidate, operand) == Some(Ordering::Less),
        Lte => matches!(ordered(candidate, operand), Some(Ordering::Less | Ordering::Equal)),
        Gt => ordered(candidate, operand) == Some(Ordering::Greater),
        Gte => matches!(ordered(candidate, operand), Some(Ordering::Greater | Ordering::Equal)),
        In => operand
            .as_array()
            .is_some_and(|values| values.iter().any(|v| loose_eq(candidate, v))),
        NotIn => !operand
            .as_array()
            .is_some_and(|values| values.iter().any(|v| loose_eq(candidate, v))),
        Contains => textual(false, |a, b| a.contains(b)),
        NotContains => !textual(false, |a, b| a.contains(b)),
        Containsi => textual(true, |a, b| a.contains(b)),
        NotContainsi => !textual(true, |a, b| a.contains(b)),
        StartsWith => textual(false, |a, b| a.starts_with(b)),
        StartsWithi => textual(true, |a, b| a.starts_with(b)),
        EndsWith => textual(false, |a, b| a.ends_with(b)),
        EndsWithi => textual(true, |a, b| a.ends_with(b)),
        Null => operand.as_bool().unwrap_or(true) == candidate.is_null(),
        NotNull => operand.as_bool().unwrap_or(true) != candidate.is_null(),
        Between => match operand.as_array().map(Vec::as_slice) {
            Some([low, high]) => {
                matches!(ordered(candidate, low), Some(Ordering::Greater | Ordering::Equal))
                    && matches!(ordered(candidate, high), Some(Ordering::Less | Ordering::Equal))
            }
            _ => false,
        },
    }
}
