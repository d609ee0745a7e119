use serde_json::{Map, Value};

use crate::params::{FilterExpression, ParamsBag, SortEntry};
use crate::populate::PopulationStep;
use crate::schema::{ContentTypeSchema, PUBLISHED_AT};

/// Read request handed to a storage engine
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryDescriptor {
    pub filters: Option<FilterExpression>,
    /// Case-insensitive free-text search over text attributes
    pub search: Option<String>,
    pub sort: Vec<SortEntry>,
    /// Attributes to return besides `id`; `None` returns all of them
    pub fields: Option<Vec<String>>,
    pub offset: Option<u64>,
    pub limit: Option<u64>,
    /// Opaque options forwarded from the `plugin` parameter
    pub plugin: Option<Map<String, Value>>,
}

impl QueryDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a filter (combined with AND)
    pub fn filter(mut self, filter: FilterExpression) -> Self {
        self.filters = FilterExpression::all([self.filters.take(), Some(filter)]);
        self
    }

    pub fn search(mut self, query: Option<String>) -> Self {
        self.search = query;
        self
    }

    pub fn order_by(mut self, entry: SortEntry) -> Self {
        self.sort.push(entry);
        self
    }

    pub fn fields(mut self, fields: Option<Vec<String>>) -> Self {
        self.fields = fields;
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Restrict to the window `[offset, offset + limit)`
    pub fn window(self, offset: u64, limit: u64) -> Self {
        self.offset(offset).limit(limit)
    }

    /// Descriptor for normalized parameters, without pagination
    pub(crate) fn for_params(schema: &ContentTypeSchema, params: &ParamsBag) -> Self {
        let live = (schema.draft_and_publish && params.is_live())
            .then(|| FilterExpression::not_null(PUBLISHED_AT));

        Self {
            filters: FilterExpression::all([params.filters.clone(), live]),
            search: params.query.clone(),
            sort: params.sort.clone(),
            fields: storage_fields(params.fields.as_deref(), &params.populate),
            offset: None,
            limit: None,
            plugin: params.plugin.clone(),
        }
    }
}

/// Selected scalars plus the relation attributes population reads
fn storage_fields(selected: Option<&[String]>, populate: &[PopulationStep]) -> Option<Vec<String>> {
    let selected = selected?;
    let mut fields = selected.to_vec();
    for step in populate {
        if !fields.contains(&step.field) {
            fields.push(step.field.clone());
        }
    }
    Some(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::{PublicationState, SortOrder};
    use crate::schema::{AttributeDefinition, Cardinality};
    use serde_json::json;
    use type_mapping::AttributeType;

    #[test]
    fn test_builder_combines_filters() {
        let descriptor = QueryDescriptor::new()
            .filter(FilterExpression::eq("title", json!("a")))
            .filter(FilterExpression::eq("views", json!(1)))
            .order_by(SortEntry::new("views", SortOrder::Desc))
            .window(10, 5);

        assert_eq!(
            descriptor.filters,
            Some(FilterExpression::and(vec![
                FilterExpression::eq("title", json!("a")),
                FilterExpression::eq("views", json!(1)),
            ]))
        );
        assert_eq!((descriptor.offset, descriptor.limit), (Some(10), Some(5)));
        assert_eq!(descriptor.sort.len(), 1);
    }

    #[test]
    fn test_live_publication_adds_filter() {
        let schema = ContentTypeSchema::collection("article")
            .attribute("title", AttributeDefinition::scalar(AttributeType::String))
            .with_draft_and_publish();

        let live = ParamsBag {
            publication_state: Some(PublicationState::Live),
            ..ParamsBag::default()
        };
        assert_eq!(
            QueryDescriptor::for_params(&schema, &live).filters,
            Some(FilterExpression::not_null(PUBLISHED_AT))
        );

        let preview = ParamsBag {
            publication_state: Some(PublicationState::Preview),
            ..ParamsBag::default()
        };
        assert_eq!(QueryDescriptor::for_params(&schema, &preview).filters, None);
    }

    #[test]
    fn test_fields_include_populated_relations() {
        let schema = ContentTypeSchema::collection("article");
        let params = ParamsBag {
            fields: Some(vec!["title".to_string()]),
            populate: vec![PopulationStep {
                field: "author".to_string(),
                cardinality: Cardinality::One,
                target: crate::populate::PopulationTarget::Relation {
                    uid: "user".to_string(),
                    params: ParamsBag::default(),
                },
            }],
            ..ParamsBag::default()
        };
        assert_eq!(
            QueryDescriptor::for_params(&schema, &params).fields,
            Some(vec!["title".to_string(), "author".to_string()])
        );
        assert_eq!(
            QueryDescriptor::for_params(&schema, &ParamsBag::default()).fields,
            None
        );
    }
}
