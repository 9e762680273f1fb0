use serde::Serialize;
use utoipa::ToSchema;

use crate::{
    config::AnalyticsConfig,
    error::{Error, Result},
};

/// 1-based page of a list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: usize,
    pub limit: usize,
}

impl PageRequest {
    pub fn new(page: Option<usize>, limit: Option<usize>, config: &AnalyticsConfig) -> Result<Self> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(Error::Validation("page starts at 1".to_string()));
        }
        let limit = limit.unwrap_or(config.default_page_size);
        if limit == 0 {
            return Err(Error::Validation("limit must be at least 1".to_string()));
        }
        Ok(Self {
            page,
            limit: limit.min(config.max_page_size.max(1)),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub page: usize,
    pub limit: usize,
    pub total: usize,
    pub total_pages: usize,
}

/// `ceil(total / limit)`, never below 1 so an empty list still has a page.
pub fn total_pages(total: usize, limit: usize) -> usize {
    total.div_ceil(limit.max(1)).max(1)
}

pub fn paginate<T>(items: Vec<T>, request: PageRequest) -> (Vec<T>, Pagination) {
    let total = items.len();
    let items = items
        .into_iter()
        .skip((request.page - 1).saturating_mul(request.limit))
        .take(request.limit)
        .collect();
    (
        items,
        Pagination {
            page: request.page,
            limit: request.limit,
            total,
            total_pages: total_pages(total, request.limit),
        },
    )
}

/// Stable, case-insensitive sort by a name or title.
pub fn sort_by_name<T>(items: &mut [T], key: impl Fn(&T) -> &str) {
    items.sort_by_cached_key(|item| key(item).to_lowercase());
}
