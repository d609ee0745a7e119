//! Filter expressions
//!
//! Raw filter objects (`{"title": {"$contains": "rust"}, "$or": [...]}`) are parsed
//! against the content-type schema into a typed tree. Paths may walk through
//! non-polymorphic relations (`{"author": {"name": {"$eq": "Ada"}}}`).

use serde_json::{Map, Value};
use type_mapping::{coerce_value, AttributeType, EntityId};

use super::join_path;
use crate::errors::EntityServiceError;
use crate::schema::{AttributeDefinition, ContentTypeSchema, SchemaRegistry};

/// Comparison operators accepted in filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    Eq,
    Eqi,
    Ne,
    Nei,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    NotContains,
    Containsi,
    NotContainsi,
    StartsWith,
    StartsWithi,
    EndsWith,
    EndsWithi,
    Null,
    NotNull,
    Between,
}

impl FilterOperator {
    pub fn from_key(key: &str) -> Option<Self> {
        let op = match key {
            "$eq" => Self::Eq,
            "$eqi" => Self::Eqi,
            "$ne" => Self::Ne,
            "$nei" => Self::Nei,
            "$lt" => Self::Lt,
            "$lte" => Self::Lte,
            "$gt" => Self::Gt,
            "$gte" => Self::Gte,
            "$in" => Self::In,
            "$notIn" => Self::NotIn,
            "$contains" => Self::Contains,
            "$notContains" => Self::NotContains,
            "$containsi" => Self::Containsi,
            "$notContainsi" => Self::NotContainsi,
            "$startsWith" => Self::StartsWith,
            "$startsWithi" => Self::StartsWithi,
            "$endsWith" => Self::EndsWith,
            "$endsWithi" => Self::EndsWithi,
            "$null" => Self::Null,
            "$notNull" => Self::NotNull,
            "$between" => Self::Between,
            _ => return None,
        };
        Some(op)
    }

    pub fn as_key(&self) -> &'static str {
        match self {
            Self::Eq => "$eq",
            Self::Eqi => "$eqi",
            Self::Ne => "$ne",
            Self::Nei => "$nei",
            Self::Lt => "$lt",
            Self::Lte => "$lte",
            Self::Gt => "$gt",
            Self::Gte => "$gte",
            Self::In => "$in",
            Self::NotIn => "$notIn",
            Self::Contains => "$contains",
            Self::NotContains => "$notContains",
            Self::Containsi => "$containsi",
            Self::NotContainsi => "$notContainsi",
            Self::StartsWith => "$startsWith",
            Self::StartsWithi => "$startsWithi",
            Self::EndsWith => "$endsWith",
            Self::EndsWithi => "$endsWithi",
            Self::Null => "$null",
            Self::NotNull => "$notNull",
            Self::Between => "$between",
        }
    }

    /// Operators comparing text, whatever the attribute type
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            Self::Eqi
                | Self::Nei
                | Self::Contains
                | Self::NotContains
                | Self::Containsi
                | Self::NotContainsi
                | Self::StartsWith
                | Self::StartsWithi
                | Self::EndsWith
                | Self::EndsWithi
        )
    }
}

/// Single condition on an attribute path
#[derive(Debug, Clone, PartialEq)]
pub struct FilterCondition {
    /// Attribute path from the filtered content type; the last segment is a scalar or `id`
    pub path: Vec<String>,
    pub operator: FilterOperator,
    /// Operand, already coerced to the attribute type
    pub value: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOperator {
    And,
    Or,
}

/// Filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterExpression {
    Condition(FilterCondition),
    Group {
        operator: LogicalOperator,
        filters: Vec<FilterExpression>,
    },
    Not(Box<FilterExpression>),
}

impl FilterExpression {
    /// Condition on a dotted path (`author.name`)
    pub fn condition(path: &str, operator: FilterOperator, value: Value) -> Self {
        Self::Condition(FilterCondition {
            path: path.split('.').map(str::to_string).collect(),
            operator,
            value,
        })
    }

    pub fn and(filters: Vec<FilterExpression>) -> Self {
        Self::Group {
            operator: LogicalOperator::And,
            filters,
        }
    }

    pub fn or(filters: Vec<FilterExpression>) -> Self {
        Self::Group {
            operator: LogicalOperator::Or,
            filters,
        }
    }

    pub fn negate(filter: FilterExpression) -> Self {
        Self::Not(Box::new(filter))
    }

    pub fn eq(path: &str, value: Value) -> Self {
        Self::condition(path, FilterOperator::Eq, value)
    }

    pub fn in_values(path: &str, values: Vec<Value>) -> Self {
        Self::condition(path, FilterOperator::In, Value::Array(values))
    }

    pub fn not_null(path: &str) -> Self {
        Self::condition(path, FilterOperator::NotNull, Value::Bool(true))
    }

    /// `id` equals the given identifier
    pub fn id_eq(id: &EntityId) -> Self {
        Self::eq("id", id.to_value())
    }

    /// `id` is one of the given identifiers
    pub fn id_in<'a>(ids: impl IntoIterator<Item = &'a EntityId>) -> Self {
        Self::in_values("id", ids.into_iter().map(EntityId::to_value).collect())
    }

    /// Combine optional filters with AND, flattening single members
    pub fn all(filters: impl IntoIterator<Item = Option<FilterExpression>>) -> Option<Self> {
        let mut filters: Vec<_> = filters.into_iter().flatten().collect();
        match filters.len() {
            0 => None,
            1 => filters.pop(),
            _ => Some(Self::and(filters)),
        }
    }
}

/// Parse the `filters` parameter of `schema`
pub(crate) fn parse_filters(
    registry: &SchemaRegistry,
    schema: &ContentTypeSchema,
    raw: &Value,
    path: &str,
) -> Result<Option<FilterExpression>, EntityServiceError> {
    match raw {
        Value::Null => Ok(None),
        Value::Object(map) if map.is_empty() => Ok(None),
        Value::Object(map) => {
            let parser = FilterParser { registry };
            parser.parse_object(schema, &[], map, path).map(Some)
        }
        _ => Err(EntityServiceError::invalid_parameter(
            path,
            "filters must be an object",
        )),
    }
}

struct FilterParser<'a> {
    registry: &'a SchemaRegistry,
}

/// What a filter path resolves to
enum Leaf {
    Id,
    Scalar(AttributeType),
}

impl<'a> FilterParser<'a> {
    /// Parse an object whose keys are attributes or logical operators
    fn parse_object(
        &self,
        schema: &ContentTypeSchema,
        prefix: &[String],
        map: &Map<String, Value>,
        path: &str,
    ) -> Result<FilterExpression, EntityServiceError> {
        let mut filters = Vec::with_capacity(map.len());

        for (key, value) in map {
            let key_path = join_path(path, key);
            let filter = match key.as_str() {
                "$and" | "$or" => {
                    let members = self.parse_members(&key_path, value, |member, member_path| {
                        self.parse_object(schema, prefix, member, member_path)
                    })?;
                    if key == "$and" {
                        FilterExpression::and(members)
                    } else {
                        FilterExpression::or(members)
                    }
                }
                "$not" => {
                    let inner = value.as_object().ok_or_else(|| {
                        EntityServiceError::invalid_parameter(&key_path, "$not expects an object")
                    })?;
                    FilterExpression::negate(self.parse_object(schema, prefix, inner, &key_path)?)
                }
                key if key.starts_with('$') => {
                    return Err(EntityServiceError::invalid_parameter(
                        key_path,
                        "operator must be applied to an attribute",
                    ));
                }
                attribute => self.parse_attribute(schema, prefix, attribute, value, &key_path)?,
            };
            filters.push(filter);
        }

        Ok(match filters.len() {
            1 => filters.remove(0),
            _ => FilterExpression::and(filters),
        })
    }

    fn parse_attribute(
        &self,
        schema: &ContentTypeSchema,
        prefix: &[String],
        attribute: &str,
        value: &Value,
        path: &str,
    ) -> Result<FilterExpression, EntityServiceError> {
        let mut attr_path = prefix.to_vec();
        attr_path.push(attribute.to_string());

        if attribute == "id" {
            return self.parse_operators(&attr_path, &Leaf::Id, value, path);
        }

        match schema.attribute_def(attribute) {
            Some(AttributeDefinition::Scalar { ty, .. }) => {
                if *ty == AttributeType::Password {
                    return Err(EntityServiceError::invalid_parameter(
                        path,
                        "password attributes cannot be filtered",
                    ));
                }
                self.parse_operators(&attr_path, &Leaf::Scalar(*ty), value, path)
            }
            Some(AttributeDefinition::Relation { target, .. }) => {
                let target_schema = self.registry.get(target)?;
                match value {
                    Value::Object(map) if !is_operator_object(map) => {
                        self.parse_object(target_schema, &attr_path, map, path)
                    }
                    // operators or a bare value on a relation compare the related id
                    _ => {
                        attr_path.push("id".to_string());
                        self.parse_operators(&attr_path, &Leaf::Id, value, path)
                    }
                }
            }
            Some(AttributeDefinition::MorphRelation { .. }) => Err(
                EntityServiceError::invalid_parameter(path, "polymorphic relations cannot be filtered"),
            ),
            None => Err(EntityServiceError::invalid_parameter(
                path,
                format!("unknown attribute '{}' on {}", attribute, schema.uid),
            )),
        }
    }

    /// Parse the operator object (or shorthand value) applied to one leaf
    fn parse_operators(
        &self,
        attr_path: &[String],
        leaf: &Leaf,
        value: &Value,
        path: &str,
    ) -> Result<FilterExpression, EntityServiceError> {
        let map = match value {
            Value::Object(map) => map,
            Value::Array(values) => {
                let operand = Value::Array(values.clone());
                return self.condition(attr_path, leaf, FilterOperator::In, &operand, path);
            }
            Value::Null => {
                return self.condition(attr_path, leaf, FilterOperator::Null, &Value::Bool(true), path);
            }
            scalar => return self.condition(attr_path, leaf, FilterOperator::Eq, scalar, path),
        };

        if map.is_empty() {
            return Err(EntityServiceError::invalid_parameter(path, "empty filter object"));
        }

        let mut filters = Vec::with_capacity(map.len());
        for (key, operand) in map {
            let op_path = join_path(path, key);
            let filter = match key.as_str() {
                "$and" | "$or" => {
                    let members = self.parse_members(&op_path, operand, |member, member_path| {
                        self.parse_operators(attr_path, leaf, &Value::Object(member.clone()), member_path)
                    })?;
                    if key == "$and" {
                        FilterExpression::and(members)
                    } else {
                        FilterExpression::or(members)
                    }
                }
                "$not" => FilterExpression::negate(self.parse_operators(attr_path, leaf, operand, &op_path)?),
                other => {
                    let operator = FilterOperator::from_key(other).ok_or_else(|| {
                        EntityServiceError::invalid_parameter(&op_path, format!("unknown operator '{}'", other))
                    })?;
                    self.condition(attr_path, leaf, operator, operand, &op_path)?
                }
            };
            filters.push(filter);
        }

        Ok(match filters.len() {
            1 => filters.remove(0),
            _ => FilterExpression::and(filters),
        })
    }

    fn parse_members<F>(
        &self,
        path: &str,
        value: &Value,
        mut parse: F,
    ) -> Result<Vec<FilterExpression>, EntityServiceError>
    where
        F: FnMut(&Map<String, Value>, &str) -> Result<FilterExpression, EntityServiceError>,
    {
        let members = match value {
            Value::Array(members) => members.iter().collect::<Vec<_>>(),
            Value::Object(_) => vec![value],
            _ => {
                return Err(EntityServiceError::invalid_parameter(
                    path,
                    "expected an array of filter objects",
                ))
            }
        };

        members
            .into_iter()
            .enumerate()
            .map(|(i, member)| {
                let member_path = join_path(path, &i.to_string());
                let map = member.as_object().ok_or_else(|| {
                    EntityServiceError::invalid_parameter(&member_path, "expected a filter object")
                })?;
                parse(map, &member_path)
            })
            .collect()
    }

    fn condition(
        &self,
        attr_path: &[String],
        leaf: &Leaf,
        operator: FilterOperator,
        operand: &Value,
        path: &str,
    ) -> Result<FilterExpression, EntityServiceError> {
        let value = coerce_operand(leaf, operator, operand, path)?;
        Ok(FilterExpression::Condition(FilterCondition {
            path: attr_path.to_vec(),
            operator,
            value,
        }))
    }
}

fn is_operator_object(map: &Map<String, Value>) -> bool {
    !map.is_empty()
        && map
            .keys()
            .all(|key| FilterOperator::from_key(key).is_some() || key == "$not")
}

fn coerce_operand(
    leaf: &Leaf,
    operator: FilterOperator,
    operand: &Value,
    path: &str,
) -> Result<Value, EntityServiceError> {
    let invalid = |message: String| EntityServiceError::invalid_parameter(path, message);

    match operator {
        FilterOperator::Null | FilterOperator::NotNull => coerce_value(AttributeType::Boolean, operand)
            .ok()
            .filter(Value::is_boolean)
            .ok_or_else(|| invalid(format!("{} expects a boolean", operator.as_key()))),
        FilterOperator::In | FilterOperator::NotIn => {
            let values = match operand {
                Value::Array(values) => values.as_slice(),
                single => std::slice::from_ref(single),
            };
            values
                .iter()
                .map(|v| coerce_leaf(leaf, v).map_err(&invalid))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array)
        }
        FilterOperator::Between => match operand {
            Value::Array(bounds) if bounds.len() == 2 => bounds
                .iter()
                .map(|v| coerce_leaf(leaf, v).map_err(&invalid))
                .collect::<Result<Vec<_>, _>>()
                .map(Value::Array),
            _ => Err(invalid("$between expects an array of two bounds".to_string())),
        },
        op if op.is_textual() => match operand {
            Value::String(_) => Ok(operand.clone()),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            _ => Err(invalid(format!("{} expects a string", op.as_key()))),
        },
        _ => {
            if operand.is_null() {
                return Err(invalid(format!(
                    "{} cannot compare with null, use $null",
                    operator.as_key()
                )));
            }
            coerce_leaf(leaf, operand).map_err(invalid)
        }
    }
}

fn coerce_leaf(leaf: &Leaf, value: &Value) -> Result<Value, String> {
    match leaf {
        Leaf::Id => EntityId::from_value(value)
            .map(|id| id.to_value())
            .ok_or_else(|| format!("invalid identifier {}", value)),
        Leaf::Scalar(ty) => coerce_value(*ty, value).map_err(|e| e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;
    use serde_json::json;

    fn registry() -> SchemaRegistry {
        SchemaRegistry::builder()
            .register(
                ContentTypeSchema::collection("user")
                    .attribute("name", AttributeDefinition::scalar(AttributeType::String))
                    .attribute("secret", AttributeDefinition::scalar(AttributeType::Password)),
            )
            .register(
                ContentTypeSchema::collection("article")
                    .attribute("title", AttributeDefinition::scalar(AttributeType::String))
                    .attribute("views", AttributeDefinition::scalar(AttributeType::Integer))
                    .attribute("author", AttributeDefinition::relation("user", Cardinality::One))
                    .attribute("subject", AttributeDefinition::morph(["user"], Cardinality::One)),
            )
            .build()
            .unwrap()
    }

    fn parse(raw: Value) -> Result<Option<FilterExpression>, EntityServiceError> {
        let registry = registry();
        let schema = registry.get("article").unwrap();
        parse_filters(&registry, schema, &raw, "filters")
    }

    #[test]
    fn test_operator_keys_round_trip() {
        for key in ["$eq", "$notContainsi", "$between", "$null", "$startsWithi"] {
            assert_eq!(FilterOperator::from_key(key).map(|op| op.as_key()), Some(key));
        }
        assert_eq!(FilterOperator::from_key("$like"), None);
    }

    #[test]
    fn test_shorthand_and_coercion() {
        let parsed = parse(json!({"views": "10", "title": ["a", "b"]})).unwrap();
        assert_eq!(
            parsed,
            Some(FilterExpression::and(vec![
                FilterExpression::eq("views", json!(10)),
                FilterExpression::in_values("title", vec![json!("a"), json!("b")]),
            ]))
        );
    }

    #[test]
    fn test_relation_path_and_logical_groups() {
        let parsed = parse(json!({
            "$or": [
                {"author": {"name": {"$eqi": "ada"}}},
                {"author": 7}
            ]
        }))
        .unwrap();

        assert_eq!(
            parsed,
            Some(FilterExpression::or(vec![
                FilterExpression::condition("author.name", FilterOperator::Eqi, json!("ada")),
                FilterExpression::eq("author.id", json!(7)),
            ]))
        );
    }

    #[test]
    fn test_not_and_null() {
        let parsed = parse(json!({"title": {"$not": {"$null": true}}, "$not": {"views": {"$lt": 3}}}))
            .unwrap();
        assert_eq!(
            parsed,
            Some(FilterExpression::and(vec![
                FilterExpression::negate(FilterExpression::condition(
                    "title",
                    FilterOperator::Null,
                    json!(true)
                )),
                FilterExpression::negate(FilterExpression::condition(
                    "views",
                    FilterOperator::Lt,
                    json!(3)
                )),
            ]))
        );
    }

    #[test]
    fn test_invalid_filters_report_path() {
        let cases = [
            (json!({"title": {"$like": "x"}}), "filters.title.$like"),
            (json!({"nope": 1}), "filters.nope"),
            (json!({"views": {"$gt": "many"}}), "filters.views.$gt"),
            (json!({"views": {"$between": [1]}}), "filters.views.$between"),
            (json!({"subject": {"name": "x"}}), "filters.subject"),
            (json!({"author": {"secret": "x"}}), "filters.author.secret"),
            (json!({"$eq": 1}), "filters.$eq"),
            (json!({"$or": [1]}), "filters.$or.0"),
        ];

        for (raw, expected_path) in cases {
            let err = parse(raw.clone()).unwrap_err();
            assert_eq!(err.path(), Some(expected_path), "for {}", raw);
        }
        assert!(parse(json!("title")).is_err());
    }

    #[test]
    fn test_empty_filters() {
        assert_eq!(parse(json!({})).unwrap(), None);
        assert_eq!(parse(Value::Null).unwrap(), None);
    }

    #[test]
    fn test_all_flattens() {
        assert_eq!(FilterExpression::all([None, None]), None);
        let single = FilterExpression::eq("id", json!(1));
        assert_eq!(
            FilterExpression::all([None, Some(single.clone())]),
            Some(single)
        );
    }
}
