//! Raw record to API entity

use serde_json::Value;
use type_mapping::Entity;

use crate::schema::ContentTypeSchema;
use crate::storage::RawRecord;

/// Key marking the concrete content type of a polymorphic relation member
pub(crate) const TYPE_KEY: &str = "__type";

/// Build the entity for a record: `id` plus selected scalars.
/// Relations stay absent until population sets them.
pub(crate) fn shape_record(
    schema: &ContentTypeSchema,
    record: &RawRecord,
    fields: Option<&[String]>,
) -> Entity {
    let mut entity = Entity::new(record.id.clone());
    for (name, _) in schema.scalar_attributes() {
        if fields.is_some_and(|selected| !selected.iter().any(|f| f == name)) {
            continue;
        }
        let value = record.values.get(name).cloned().unwrap_or(Value::Null);
        entity.set_scalar(name, value);
    }
    entity
}
