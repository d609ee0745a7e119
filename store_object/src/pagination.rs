//! Pagination strategy
//!
//! Turns a [`PaginationSpec`] into storage windows and builds the metadata
//! returned with paged results. Unbounded requests are collected in chunks
//! so no single storage call is unbounded.

use config::PaginationConfig;
use serde::Serialize;
use std::future::Future;

use crate::errors::EntityServiceError;
use crate::params::PaginationSpec;

/// Page of results with its pagination metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaginatedResult<T> {
    pub results: Vec<T>,
    pub pagination: PaginationMeta,
}

impl<T> PaginatedResult<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> PaginatedResult<U> {
        PaginatedResult {
            results: self.results.into_iter().map(f).collect(),
            pagination: self.pagination,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum PaginationMeta {
    #[serde(rename_all = "camelCase")]
    Page {
        page: u64,
        page_size: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        page_count: Option<u64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },
    Offset {
        start: u64,
        limit: u64,
        #[serde(skip_serializing_if = "Option::is_none")]
        total: Option<u64>,
    },
}

impl PaginationMeta {
    pub fn total(&self) -> Option<u64> {
        match self {
            PaginationMeta::Page { total, .. } | PaginationMeta::Offset { total, .. } => *total,
        }
    }
}

/// Fetch results for `spec` through `fetch_page(offset, limit) -> (items, total)`
pub async fn paginate<T, F, Fut>(
    spec: &PaginationSpec,
    config: &PaginationConfig,
    mut fetch_page: F,
) -> Result<PaginatedResult<T>, EntityServiceError>
where
    F: FnMut(u64, u64) -> Fut,
    Fut: Future<Output = Result<(Vec<T>, u64), EntityServiceError>>,
{
    let total_if = |total: u64| config.with_count.then_some(total);

    match *spec {
        PaginationSpec::PageSize { page, page_size } => {
            let offset = page.saturating_sub(1).saturating_mul(page_size);
            let (results, total) = fetch_page(offset, page_size).await?;
            Ok(PaginatedResult {
                results,
                pagination: PaginationMeta::Page {
                    page,
                    page_size,
                    page_count: total_if(total.div_ceil(page_size.max(1))),
                    total: total_if(total),
                },
            })
        }
        PaginationSpec::OffsetLimit { start, limit } => {
            let (results, total) = fetch_page(start, limit).await?;
            Ok(PaginatedResult {
                results,
                pagination: PaginationMeta::Offset {
                    start,
                    limit,
                    total: total_if(total),
                },
            })
        }
        PaginationSpec::Unbounded { start } => {
            let chunk = config.unbounded_chunk_size.max(1);
            let mut results = Vec::new();
            let mut offset = start;
            let total = loop {
                let (items, total) = fetch_page(offset, chunk).await?;
                let fetched = items.len() as u64;
                results.extend(items);
                offset += fetched;
                if fetched < chunk || offset >= total {
                    break total;
                }
            };
            crate::trace_log!(total = total, chunk = chunk, "Collected unbounded result set");
            Ok(PaginatedResult {
                pagination: PaginationMeta::Offset {
                    start,
                    limit: results.len() as u64,
                    total: total_if(total),
                },
                results,
            })
        }
    }
}
