//! Batched relation loading
//!
//! Each population step issues one storage query for all parents (one per
//! target type for polymorphic relations). Steps at the same level run
//! concurrently; results are assigned per field, so the outcome does not
//! depend on completion order.

use futures::future::{try_join_all, BoxFuture, FutureExt};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashMap, HashSet};
use type_mapping::{Entity, EntityId, RelationValue};

use super::resolver::{PopulationStep, PopulationTarget};
use crate::errors::EntityServiceError;
use crate::params::{FilterExpression, ParamsBag};
use crate::schema::{Cardinality, SchemaRegistry};
use crate::shape::{shape_record, TYPE_KEY};
use crate::storage::{QueryDescriptor, RawRecord, StorageEngine};

pub(crate) struct PopulateContext<'a> {
    pub registry: &'a SchemaRegistry,
    pub storage: &'a dyn StorageEngine,
}

/// Populate `entities` (shaped from `records`, same order) with every step
pub(crate) fn populate_entities<'a>(
    ctx: &'a PopulateContext<'a>,
    records: &'a [RawRecord],
    entities: &'a mut [Entity],
    steps: &'a [PopulationStep],
) -> BoxFuture<'a, Result<(), EntityServiceError>> {
    async move {
        if steps.is_empty() || records.is_empty() {
            return Ok(());
        }

        let loaded = try_join_all(steps.iter().map(|step| load_step(ctx, records, step))).await?;

        for (step, values) in steps.iter().zip(loaded) {
            for (entity, value) in entities.iter_mut().zip(values) {
                entity.set_relation(&step.field, value);
            }
        }
        Ok(())
    }
    .boxed()
}

/// Relation value of one step for each parent record
pub(crate) async fn load_step<'a>(
    ctx: &'a PopulateContext<'a>,
    records: &'a [RawRecord],
    step: &'a PopulationStep,
) -> Result<Vec<RelationValue>, EntityServiceError> {
    crate::trace_log!(field = %step.field, parents = records.len(), "Populating relation");
    match &step.target {
        PopulationTarget::Relation { uid, params } => {
            load_relation(ctx, records, step, uid, params).await
        }
        PopulationTarget::Morph { fragments } => load_morph(ctx, records, step, fragments).await,
    }
}

async fn load_relation<'a>(
    ctx: &'a PopulateContext<'a>,
    records: &'a [RawRecord],
    step: &'a PopulationStep,
    uid: &'a str,
    params: &'a ParamsBag,
) -> Result<Vec<RelationValue>, EntityServiceError> {
    let per_parent: Vec<Vec<EntityId>> = records
        .iter()
        .map(|record| related_ids(record.get(&step.field)))
        .collect();

    let mut seen = HashSet::new();
    let all_ids: Vec<&EntityId> = per_parent
        .iter()
        .flatten()
        .filter(|id| seen.insert(*id))
        .collect();

    if all_ids.is_empty() {
        return Ok(per_parent
            .iter()
            .map(|_| empty_value(step.cardinality, params.count))
            .collect());
    }

    let schema = ctx.registry.get(uid)?;
    let descriptor =
        QueryDescriptor::for_params(schema, params).filter(FilterExpression::id_in(all_ids));

    if params.count {
        let descriptor = QueryDescriptor {
            fields: Some(Vec::new()),
            sort: Vec::new(),
            ..descriptor
        };
        let outcome = ctx.storage.execute(uid, &descriptor).await?;
        let matching: HashSet<EntityId> = outcome.records.into_iter().map(|r| r.id).collect();
        return Ok(per_parent
            .iter()
            .map(|ids| RelationValue::Count {
                count: ids.iter().filter(|id| matching.contains(*id)).count() as u64,
            })
            .collect());
    }

    let outcome = ctx.storage.execute(uid, &descriptor).await?;
    let children_records = outcome.records;
    let mut children: Vec<Entity> = children_records
        .iter()
        .map(|record| shape_record(schema, record, params.fields.as_deref()))
        .collect();
    populate_entities(ctx, &children_records, &mut children, &params.populate).await?;

    let position: HashMap<&EntityId, usize> = children_records
        .iter()
        .enumerate()
        .map(|(i, record)| (&record.id, i))
        .collect();
    let sorted = !params.sort.is_empty();

    Ok(per_parent
        .iter()
        .map(|ids| {
            let mut found: Vec<usize> = ids.iter().filter_map(|id| position.get(id).copied()).collect();
            if sorted {
                found.sort_unstable();
            }
            match step.cardinality {
                Cardinality::One => RelationValue::One(
                    found.first().map(|&i| Box::new(children[i].clone())),
                ),
                Cardinality::Many => {
                    RelationValue::Many(found.into_iter().map(|i| children[i].clone()).collect())
                }
            }
        })
        .collect())
}

async fn load_morph<'a>(
    ctx: &'a PopulateContext<'a>,
    records: &'a [RawRecord],
    step: &'a PopulationStep,
    fragments: &'a BTreeMap<String, ParamsBag>,
) -> Result<Vec<RelationValue>, EntityServiceError> {
    let per_parent: Vec<Vec<(String, EntityId)>> = records
        .iter()
        .map(|record| morph_refs(record.get(&step.field)))
        .collect();

    if fragments.values().any(|params| params.count) {
        return Ok(per_parent
            .iter()
            .map(|refs| RelationValue::Count {
                count: refs.len() as u64,
            })
            .collect());
    }

    let mut grouped: BTreeMap<&str, Vec<&EntityId>> = BTreeMap::new();
    for (uid, id) in per_parent.iter().flatten() {
        if fragments.contains_key(uid) {
            let ids = grouped.entry(uid.as_str()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
            }
        }
    }

    let loaded = try_join_all(grouped.into_iter().map(|(uid, ids)| async move {
        let params = &fragments[uid];
        let schema = ctx.registry.get(uid)?;
        let descriptor =
            QueryDescriptor::for_params(schema, params).filter(FilterExpression::id_in(ids));
        let outcome = ctx.storage.execute(uid, &descriptor).await?;

        let mut entities: Vec<Entity> = outcome
            .records
            .iter()
            .map(|record| shape_record(schema, record, params.fields.as_deref()))
            .collect();
        populate_entities(ctx, &outcome.records, &mut entities, &params.populate).await?;

        Ok::<_, EntityServiceError>(
            entities
                .into_iter()
                .map(|mut entity| {
                    entity.set_scalar(TYPE_KEY, json!(uid));
                    ((uid.to_string(), entity.id.clone()), entity)
                })
                .collect::<Vec<_>>(),
        )
    }))
    .await?;

    let found: HashMap<(String, EntityId), Entity> = loaded.into_iter().flatten().collect();

    Ok(per_parent
        .iter()
        .map(|refs| {
            let mut members = refs.iter().filter_map(|(uid, id)| {
                if fragments.contains_key(uid) {
                    found.get(&(uid.clone(), id.clone())).cloned()
                } else {
                    Some(Entity::new(id.clone()).with_scalar(TYPE_KEY, json!(uid)))
                }
            });
            match step.cardinality {
                Cardinality::One => RelationValue::One(members.next().map(Box::new)),
                Cardinality::Many => RelationValue::Many(members.collect()),
            }
        })
        .collect())
}

fn empty_value(cardinality: Cardinality, count: bool) -> RelationValue {
    match (count, cardinality) {
        (true, _) => RelationValue::Count { count: 0 },
        (false, Cardinality::One) => RelationValue::One(None),
        (false, Cardinality::Many) => RelationValue::Many(Vec::new()),
    }
}

/// Ids held by a stored relation value, in relation order
pub(crate) fn related_ids(value: Option<&Value>) -> Vec<EntityId> {
    let one = |value: &Value| match value {
        Value::Object(map) => map.get("id").and_then(EntityId::from_value),
        other => EntityId::from_value(other),
    };

    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(single) => one(single).into_iter().collect(),
    }
}

/// `(content type, id)` references held by a stored polymorphic relation value
pub(crate) fn morph_refs(value: Option<&Value>) -> Vec<(String, EntityId)> {
    let one = |value: &Value| {
        let uid = value.get(TYPE_KEY)?.as_str()?;
        let id = EntityId::from_value(value.get("id")?)?;
        Some((uid.to_string(), id))
    };

    match value {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.iter().filter_map(one).collect(),
        Some(single) => one(single).into_iter().collect(),
    }
}
