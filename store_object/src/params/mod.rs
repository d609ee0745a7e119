//! Parameter normalization
//!
//! Raw parameter objects are checked against the allow-list of the calling
//! operation and the content-type schema, then turned into a [`ParamsBag`].
//! Nothing reaches the storage engine before normalization succeeds.

pub mod data;
pub mod fields;
pub mod filter;
pub mod pagination;
pub mod sort;

use config::PaginationConfig;
use serde_json::{Map, Value};

pub use data::EntityData;
pub use filter::{FilterCondition, FilterExpression, FilterOperator, LogicalOperator};
pub use pagination::PaginationSpec;
pub use sort::{SortEntry, SortOrder};

use crate::errors::EntityServiceError;
use crate::populate::{self, PopulateSpec, PopulationStep};
use crate::schema::SchemaRegistry;

/// Parameter kinds an operation may accept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    Fields,
    Filters,
    Query,
    OffsetPagination,
    Pagination,
    Sort,
    Populate,
    PublicationState,
    Plugin,
    Data,
    Files,
    Count,
}

impl ParamKind {
    /// Raw keys belonging to this kind
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            ParamKind::Fields => &["fields"],
            ParamKind::Filters => &["filters"],
            ParamKind::Query => &["_q"],
            ParamKind::OffsetPagination => &["start", "limit"],
            ParamKind::Pagination => &["pagination"],
            ParamKind::Sort => &["sort"],
            ParamKind::Populate => &["populate"],
            ParamKind::PublicationState => &["publicationState"],
            ParamKind::Plugin => &["plugin"],
            ParamKind::Data => &["data"],
            ParamKind::Files => &["files"],
            ParamKind::Count => &["count"],
        }
    }

    pub fn for_key(key: &str) -> Option<Self> {
        ALL_KINDS
            .iter()
            .copied()
            .find(|kind| kind.keys().contains(&key))
    }
}

const ALL_KINDS: &[ParamKind] = &[
    ParamKind::Fields,
    ParamKind::Filters,
    ParamKind::Query,
    ParamKind::OffsetPagination,
    ParamKind::Pagination,
    ParamKind::Sort,
    ParamKind::Populate,
    ParamKind::PublicationState,
    ParamKind::Plugin,
    ParamKind::Data,
    ParamKind::Files,
    ParamKind::Count,
];

/// Allow-lists per operation
pub mod allowed {
    use super::ParamKind::{self, *};

    pub const FIND_MANY: &[ParamKind] = &[
        Fields,
        Filters,
        Query,
        OffsetPagination,
        Sort,
        Populate,
        PublicationState,
        Plugin,
    ];
    pub const FIND_PAGE: &[ParamKind] = &[
        Fields,
        Filters,
        Query,
        Pagination,
        Sort,
        Populate,
        PublicationState,
        Plugin,
    ];
    pub const FIND_ONE: &[ParamKind] = &[Fields, Populate];
    pub const CREATE: &[ParamKind] = &[Data, Files, Fields, Populate];
    pub const UPDATE: &[ParamKind] = &[Data, Files, Fields, Populate];
    pub const CLONE: &[ParamKind] = &[Data, Files, Fields, Populate];
    pub const DELETE: &[ParamKind] = &[Fields, Populate];
    pub const DELETE_MANY: &[ParamKind] = &[Filters, Query];
    pub const COUNT: &[ParamKind] = &[Filters, Query];
    pub const NESTED_POPULATE: &[ParamKind] =
        &[Fields, Filters, Sort, Populate, Count, PublicationState];
    pub const LOAD_PAGES: &[ParamKind] = &[Fields, Filters, Sort, Populate, PublicationState];
}

/// Which drafts are visible on draft-and-publish content types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublicationState {
    /// Published entities only
    #[default]
    Live,
    /// Drafts and published entities
    Preview,
}

impl PublicationState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "live" => Some(PublicationState::Live),
            "preview" => Some(PublicationState::Preview),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PublicationState::Live => "live",
            PublicationState::Preview => "preview",
        }
    }
}

/// Validated parameters of one operation (or one nested population level)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamsBag {
    /// Selected scalar attributes; `None` selects all of them
    pub fields: Option<Vec<String>>,
    pub filters: Option<FilterExpression>,
    /// Free-text search (`_q`)
    pub query: Option<String>,
    pub sort: Vec<SortEntry>,
    /// Set for operations that paginate, defaulted when absent
    pub pagination: Option<PaginationSpec>,
    pub populate: Vec<PopulationStep>,
    /// Set for operations that accept it, defaulted to live
    pub publication_state: Option<PublicationState>,
    /// Opaque, passed through to the storage engine
    pub plugin: Option<Map<String, Value>>,
    pub data: Option<EntityData>,
    /// Opaque, not interpreted
    pub files: Option<Map<String, Value>>,
    /// Nested population returns `{count}` instead of entities
    pub count: bool,
}

impl ParamsBag {
    /// Whether only published entities are visible
    pub fn is_live(&self) -> bool {
        self.publication_state == Some(PublicationState::Live)
    }
}

/// Normalizes raw parameters against the schema registry
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    registry: &'a SchemaRegistry,
    config: &'a PaginationConfig,
}

impl<'a> Normalizer<'a> {
    pub fn new(registry: &'a SchemaRegistry, config: &'a PaginationConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &'a SchemaRegistry {
        self.registry
    }

    pub fn config(&self) -> &'a PaginationConfig {
        self.config
    }

    /// Normalize the top-level parameters of an operation on `uid`
    pub fn normalize(
        &self,
        uid: &str,
        allowed: &[ParamKind],
        raw: &Value,
    ) -> Result<ParamsBag, EntityServiceError> {
        self.normalize_at(uid, allowed, raw, "")
    }

    /// Normalize parameters located at `path` (empty for the top level)
    pub(crate) fn normalize_at(
        &self,
        uid: &str,
        allowed: &[ParamKind],
        raw: &Value,
        path: &str,
    ) -> Result<ParamsBag, EntityServiceError> {
        let schema = self.registry.get(uid)?;
        let empty = Map::new();
        let params = match raw {
            Value::Null => &empty,
            Value::Object(map) => map,
            _ => {
                return Err(EntityServiceError::invalid_parameter(
                    path,
                    "parameters must be an object",
                ))
            }
        };

        for key in params.keys() {
            match ParamKind::for_key(key) {
                Some(kind) if allowed.contains(&kind) => {}
                Some(_) => {
                    return Err(EntityServiceError::invalid_parameter(
                        join_path(path, key),
                        "parameter is not accepted by this operation",
                    ))
                }
                None => {
                    return Err(EntityServiceError::invalid_parameter(
                        join_path(path, key),
                        "unknown parameter",
                    ))
                }
            }
        }

        let mut bag = ParamsBag::default();

        if let Some(raw) = params.get("fields") {
            bag.fields = fields::parse_fields(schema, raw, &join_path(path, "fields"))?;
        }

        if let Some(raw) = params.get("filters") {
            bag.filters =
                filter::parse_filters(self.registry, schema, raw, &join_path(path, "filters"))?;
        }

        if let Some(raw) = params.get("_q") {
            bag.query = match raw {
                Value::Null => None,
                Value::String(q) if q.trim().is_empty() => None,
                Value::String(q) => Some(q.trim().to_string()),
                _ => {
                    return Err(EntityServiceError::invalid_parameter(
                        join_path(path, "_q"),
                        "search query must be a string",
                    ))
                }
            };
        }

        if let Some(raw) = params.get("sort") {
            bag.sort = sort::parse_sort(self.registry, schema, raw, &join_path(path, "sort"))?;
        }

        bag.pagination = self.pagination(allowed, params, path)?;

        if allowed.contains(&ParamKind::PublicationState) {
            bag.publication_state = Some(match params.get("publicationState") {
                None | Some(Value::Null) => PublicationState::default(),
                Some(raw) => raw.as_str().and_then(PublicationState::parse).ok_or_else(|| {
                    EntityServiceError::invalid_parameter(
                        join_path(path, "publicationState"),
                        "expected 'live' or 'preview'",
                    )
                })?,
            });
        }

        if let Some(raw) = params.get("plugin") {
            bag.plugin = opaque_object(raw, &join_path(path, "plugin"))?;
        }

        if let Some(raw) = params.get("files") {
            bag.files = opaque_object(raw, &join_path(path, "files"))?;
        }

        if let Some(raw) = params.get("data") {
            bag.data = Some(data::parse_data(schema, raw, &join_path(path, "data"))?);
        }

        if let Some(raw) = params.get("count") {
            bag.count = match raw {
                Value::Bool(b) => *b,
                Value::String(s) if s == "true" => true,
                Value::String(s) if s == "false" => false,
                _ => {
                    return Err(EntityServiceError::invalid_parameter(
                        join_path(path, "count"),
                        "count must be a boolean",
                    ))
                }
            };
        }

        if let Some(raw) = params.get("populate") {
            let populate_path = join_path(path, "populate");
            if let Some(spec) = PopulateSpec::parse(raw, &populate_path)? {
                bag.populate = populate::resolve(self, uid, &spec, &populate_path)?;
            }
        }

        crate::trace_log!(uid = uid, path = path, "Parameters normalized");
        Ok(bag)
    }

    fn pagination(
        &self,
        allowed: &[ParamKind],
        params: &Map<String, Value>,
        path: &str,
    ) -> Result<Option<PaginationSpec>, EntityServiceError> {
        let offset_given = ParamKind::OffsetPagination
            .keys()
            .iter()
            .any(|key| params.contains_key(*key));
        let page_given = params.contains_key("pagination");

        if offset_given && page_given {
            return Err(EntityServiceError::invalid_parameter(
                join_path(path, "pagination"),
                "pagination and start/limit are mutually exclusive",
            ));
        }

        if offset_given {
            return pagination::parse_offset(params, self.config, path).map(Some);
        }
        if allowed.contains(&ParamKind::Pagination) {
            return pagination::parse_paged(
                params.get("pagination"),
                self.config,
                &join_path(path, "pagination"),
            )
            .map(Some);
        }
        if allowed.contains(&ParamKind::OffsetPagination) {
            return Ok(Some(PaginationSpec::all()));
        }
        Ok(None)
    }
}

fn opaque_object(raw: &Value, path: &str) -> Result<Option<Map<String, Value>>, EntityServiceError> {
    match raw {
        Value::Null => Ok(None),
        Value::Object(map) => Ok(Some(map.clone())),
        _ => Err(EntityServiceError::invalid_parameter(path, "expected an object")),
    }
}

/// Dotted error path
pub(crate) fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}
