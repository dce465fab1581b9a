//! Lenient query-string and body parsing. Bad numbers fall back to defaults
//! instead of failing the request.

use serde::Deserialize;

use crate::cache::{CacheReadOptions, SortBy, SortOrder, DEFAULT_CACHE_PAGE};
use crate::error::{Result, SixgraphError};
use crate::feed::FeedRequest;

/// Parse a number the way a browser would before truncating it.
/// Blank, non-numeric and non-finite inputs give `None`.
pub fn lenient_number(raw: Option<&str>) -> Option<i64> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>()
        .ok()
        .filter(|n| n.is_finite())
        .map(|n| n.trunc() as i64)
}

fn lenient_flag(raw: Option<&str>) -> bool {
    matches!(raw.map(str::trim), Some("true") | Some("1"))
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedParams {
    pub degree_filter: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl FeedParams {
    pub fn into_request(self, user_id: String, default_limit: usize, max_limit: usize) -> FeedRequest {
        let default_limit = i64::try_from(default_limit).unwrap_or(i64::MAX);
        FeedRequest::normalized(
            user_id,
            lenient_number(self.degree_filter.as_deref()).unwrap_or(0),
            lenient_number(self.page.as_deref()).unwrap_or(1),
            lenient_number(self.limit.as_deref()).unwrap_or(default_limit),
            max_limit,
        )
    }

    pub fn degree(&self) -> Option<u32> {
        lenient_number(self.degree_filter.as_deref())
            .and_then(|d| u32::try_from(d).ok())
            .filter(|d| *d > 0)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheParams {
    pub degree: Option<String>,
    pub limit: Option<String>,
    pub offset: Option<String>,
    pub sort_by: Option<String>,
    pub order: Option<String>,
    pub only_chats: Option<String>,
}

impl CacheParams {
    pub fn into_options(self, max_limit: usize) -> CacheReadOptions {
        let limit = lenient_number(self.limit.as_deref())
            .map(|n| usize::try_from(n).unwrap_or(1))
            .unwrap_or(DEFAULT_CACHE_PAGE);
        CacheReadOptions {
            degree: lenient_number(self.degree.as_deref())
                .and_then(|d| u32::try_from(d).ok())
                .filter(|d| *d > 0),
            limit: limit.clamp(1, max_limit.max(1)),
            offset: lenient_number(self.offset.as_deref())
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(0),
            sort_by: self.sort_by.as_deref().map(SortBy::parse_lenient).unwrap_or_default(),
            order: self.order.as_deref().map(SortOrder::parse_lenient).unwrap_or_default(),
            only_chats: lenient_flag(self.only_chats.as_deref()),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateNodeBody {
    #[serde(default)]
    pub user_id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// `{userId1, userId2}`
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairBody {
    #[serde(default)]
    pub user_id1: String,
    #[serde(default)]
    pub user_id2: String,
}

impl PairBody {
    pub fn ids(&self) -> Result<(&str, &str)> {
        Ok((required("userId1", &self.user_id1)?, required("userId2", &self.user_id2)?))
    }
}

pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str> {
    let value = value.trim();
    if value.is_empty() {
        return Err(SixgraphError::InvalidInput(format!("{} is required", field)));
    }
    Ok(value)
}
