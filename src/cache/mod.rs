//! HAS_DEGREE cache: per-user materialization of degree, mutual count and
//! chat eligibility, mirrored into the content store for paginated reads.
//!
//! The cache is a rebuildable projection. Edge writes do not invalidate it;
//! it is as fresh as the last `materialize` for that user.

pub mod lock;
mod materializer;
mod page;

pub use lock::UserLocks;
pub use materializer::DegreeCache;

use serde::{Deserialize, Serialize};

/// One HAS_DEGREE edge (or its mirrored row).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachedConnection {
    pub connection_id: String,
    pub degree: u32,
    pub mutuals: u32,
    pub is_chat: bool,
    pub updated_at: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    Degree,
    Mutuals,
    UpdatedAt,
}

impl SortBy {
    /// Unknown values fall back to `Degree`.
    pub fn parse_lenient(value: &str) -> Self {
        match value {
            "mutuals" => SortBy::Mutuals,
            "updatedAt" | "updated_at" => SortBy::UpdatedAt,
            _ => SortBy::Degree,
        }
    }

    fn column(self) -> &'static str {
        match self {
            SortBy::Degree => "degree",
            SortBy::Mutuals => "mutuals",
            SortBy::UpdatedAt => "updated_at",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

impl SortOrder {
    /// Accepts `desc`/`descending` (any case); everything else is ascending.
    pub fn parse_lenient(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "desc" | "descending" => SortOrder::Descending,
            _ => SortOrder::Ascending,
        }
    }

    fn keyword(self) -> &'static str {
        match self {
            SortOrder::Ascending => "ASC",
            SortOrder::Descending => "DESC",
        }
    }
}

/// Filter, sort and window for a cache read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheReadOptions {
    /// Only rows with exactly this degree.
    pub degree: Option<u32>,
    pub limit: usize,
    pub offset: usize,
    pub sort_by: SortBy,
    pub order: SortOrder,
    pub only_chats: bool,
}

pub const DEFAULT_CACHE_PAGE: usize = 50;

impl Default for CacheReadOptions {
    fn default() -> Self {
        Self {
            degree: None,
            limit: DEFAULT_CACHE_PAGE,
            offset: 0,
            sort_by: SortBy::default(),
            order: SortOrder::default(),
            only_chats: false,
        }
    }
}

impl CacheReadOptions {
    /// Every row for the user, in degree order.
    pub fn all() -> Self {
        Self {
            limit: usize::MAX,
            ..Self::default()
        }
    }
}

/// Which table answered a cache read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheSource {
    Mirror,
    Graph,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CachePage {
    pub connections: Vec<CachedConnection>,
    /// Rows matching the filter, ignoring limit/offset.
    pub total: usize,
    pub has_more: bool,
    pub source: CacheSource,
}

/// Outcome of one rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterializeReport {
    pub user_id: String,
    pub cached: usize,
    pub elapsed_ms: u64,
    pub mirrored: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mirror_error: Option<String>,
}
