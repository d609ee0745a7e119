//! Pagination parameters
//!
//! Offset mode reads top-level `start`/`limit`; page mode reads the
//! `pagination` object (`page`/`pageSize`, or `start`/`limit` inside it).

use config::PaginationConfig;
use serde_json::{Map, Value};

use super::join_path;
use crate::errors::EntityServiceError;

/// Normalized pagination request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaginationSpec {
    OffsetLimit { start: u64, limit: u64 },
    PageSize { page: u64, page_size: u64 },
    /// Every matching entity from `start` on, collected in chunks
    Unbounded { start: u64 },
}

impl PaginationSpec {
    /// Default for page-based operations
    pub fn first_page(config: &PaginationConfig) -> Self {
        PaginationSpec::PageSize {
            page: 1,
            page_size: config.default_page_size,
        }
    }

    /// Everything, from the first entity on
    pub fn all() -> Self {
        PaginationSpec::Unbounded { start: 0 }
    }
}

/// Top-level `start`/`limit`; without a limit everything from `start` on is read
pub(crate) fn parse_offset(
    params: &Map<String, Value>,
    config: &PaginationConfig,
    path: &str,
) -> Result<PaginationSpec, EntityServiceError> {
    offset_limit(params.get("start"), params.get("limit"), None, config, path)
}

/// The `pagination` object of page-based operations
pub(crate) fn parse_paged(
    raw: Option<&Value>,
    config: &PaginationConfig,
    path: &str,
) -> Result<PaginationSpec, EntityServiceError> {
    let map = match raw {
        None | Some(Value::Null) => return Ok(PaginationSpec::first_page(config)),
        Some(Value::Object(map)) => map,
        Some(_) => {
            return Err(EntityServiceError::invalid_parameter(
                path,
                "pagination must be an object",
            ))
        }
    };

    if let Some(key) = map
        .keys()
        .find(|key| !matches!(key.as_str(), "page" | "pageSize" | "start" | "limit"))
    {
        return Err(EntityServiceError::invalid_parameter(
            join_path(path, key),
            "unknown pagination key",
        ));
    }

    let page_based = map.contains_key("page") || map.contains_key("pageSize");
    let offset_based = map.contains_key("start") || map.contains_key("limit");

    match (page_based, offset_based) {
        (true, true) => Err(EntityServiceError::invalid_parameter(
            path,
            "page/pageSize and start/limit are mutually exclusive",
        )),
        (false, true) => offset_limit(
            map.get("start"),
            map.get("limit"),
            Some(config.default_page_size),
            config,
            path,
        ),
        (false, false) => Ok(PaginationSpec::first_page(config)),
        (true, false) => {
            let page = match map.get("page") {
                Some(value) => read_int(value, &join_path(path, "page"))?,
                None => 1,
            };
            if page < 1 {
                return Err(EntityServiceError::invalid_parameter(
                    join_path(path, "page"),
                    "page must be at least 1",
                ));
            }

            let page_size = match map.get("pageSize") {
                Some(value) => read_int(value, &join_path(path, "pageSize"))?,
                None => config.default_page_size as i64,
            };
            if page_size < 1 {
                return Err(EntityServiceError::invalid_parameter(
                    join_path(path, "pageSize"),
                    "pageSize must be at least 1",
                ));
            }

            Ok(PaginationSpec::PageSize {
                page: page as u64,
                page_size: (page_size as u64).min(config.max_limit),
            })
        }
    }
}

/// `default_limit` applies when only `start` is given; `None` reads to the end
fn offset_limit(
    start: Option<&Value>,
    limit: Option<&Value>,
    default_limit: Option<u64>,
    config: &PaginationConfig,
    path: &str,
) -> Result<PaginationSpec, EntityServiceError> {
    let start_path = join_path(path, "start");
    let limit_path = join_path(path, "limit");

    let start = match start {
        Some(value) => Some(read_int(value, &start_path)?),
        None => None,
    };
    if start.is_some_and(|s| s < 0) {
        return Err(EntityServiceError::invalid_parameter(
            start_path,
            "start must not be negative",
        ));
    }
    let start = start.map(|s| s as u64);

    let limit = match limit {
        Some(value) => Some(read_int(value, &limit_path)?),
        None => None,
    };

    match (start.unwrap_or(0), limit, default_limit) {
        (start, Some(-1), _) | (start, None, None) => Ok(PaginationSpec::Unbounded { start }),
        (_, Some(limit), _) if limit < 1 => Err(EntityServiceError::invalid_parameter(
            limit_path,
            "limit must be positive, or -1 for no limit",
        )),
        (start, Some(limit), _) => Ok(PaginationSpec::OffsetLimit {
            start,
            limit: (limit as u64).min(config.max_limit),
        }),
        (start, None, Some(default)) => Ok(PaginationSpec::OffsetLimit {
            start,
            limit: default.min(config.max_limit),
        }),
    }
}

fn read_int(value: &Value, path: &str) -> Result<i64, EntityServiceError> {
    let parsed = match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| EntityServiceError::invalid_parameter(path, "expected an integer"))
}
