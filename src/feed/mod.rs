//! Feed assembly: eligible owners from the graph (or cache), one aggregated
//! post query with a client-filtered fallback, mutual-count enrichment.

mod engine;
mod query;
pub mod visibility;

pub use engine::{FeedEngine, FeedSettings};
pub use query::{AggregatedPostQuery, FilteredPostQuery, PostCriteria, PostQuery};

use std::collections::{HashMap, HashSet};

use serde::{Serialize, Serializer};

/// A post as seen by one viewer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedPost {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub category: Option<String>,
    pub hide_from_chat: bool,
    pub expires_at: Option<String>,
    pub locked: bool,
    pub created_at: String,
    /// Raw degree ceiling stored on the post.
    pub connection_type: Option<String>,
    /// Viewer's degree to the owner, rendered as a string ("0" for own posts).
    #[serde(rename = "connectionType", serialize_with = "degree_as_string")]
    pub viewer_degree: u32,
    pub user_interested: bool,
    pub user_accepted: bool,
    pub mutual_count: usize,
}

fn degree_as_string<S: Serializer>(degree: &u32, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&degree.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub current_page: usize,
    pub limit: usize,
    pub has_more: bool,
    pub total_fetched: usize,
    pub is_up_to_date: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_page: Option<usize>,
}

impl Pagination {
    pub fn new(page: usize, limit: usize, returned: usize, has_more: bool) -> Self {
        Self {
            current_page: page,
            limit,
            has_more,
            total_fetched: page.saturating_sub(1).saturating_mul(limit).saturating_add(returned),
            is_up_to_date: page == 1 && returned == 0,
            next_page: has_more.then(|| page.saturating_add(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeedPage {
    pub posts: Vec<FeedPost>,
    pub pagination: Pagination,
}

/// A normalized feed request. Page is 1-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedRequest {
    pub user_id: String,
    /// Exact degree to keep; `None` keeps every reachable degree.
    pub degree_filter: Option<u32>,
    pub page: usize,
    pub limit: usize,
}

impl FeedRequest {
    /// Build a request from loosely-typed numbers, clamping into range.
    ///
    /// Degree filters of 0 or below mean no filter. Pages below 1 become 1.
    /// The limit is clamped to `1..=max_limit`.
    pub fn normalized(user_id: impl Into<String>, degree_filter: i64, page: i64, limit: i64, max_limit: usize) -> Self {
        let max_limit = max_limit.max(1);
        Self {
            user_id: user_id.into(),
            degree_filter: u32::try_from(degree_filter).ok().filter(|d| *d > 0),
            page: usize::try_from(page).unwrap_or(1).max(1),
            limit: usize::try_from(limit).unwrap_or(1).clamp(1, max_limit),
        }
    }

    pub fn offset(&self) -> usize {
        (self.page - 1).saturating_mul(self.limit)
    }
}

/// Who may author posts in a viewer's feed, and who is a chat peer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Eligibility {
    /// Owner id to the viewer's degree; the viewer maps to 0.
    pub degrees: HashMap<String, u32>,
    pub chat: HashSet<String>,
}

impl Eligibility {
    /// Owner ids kept by `degree_filter`, sorted. The viewer is always kept.
    pub fn owners(&self, viewer_id: &str, degree_filter: Option<u32>) -> Vec<String> {
        let mut owners: Vec<String> = self
            .degrees
            .iter()
            .filter(|(id, degree)| id.as_str() == viewer_id || degree_filter.map_or(true, |d| **degree == d))
            .map(|(id, _)| id.clone())
            .collect();
        owners.sort();
        owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_normalized_clamps() {
        let req = FeedRequest::normalized("u", -2, 0, 500, 100);
        assert_eq!(req.degree_filter, None);
        assert_eq!(req.page, 1);
        assert_eq!(req.limit, 100);
        assert_eq!(req.offset(), 0);

        let req = FeedRequest::normalized("u", 2, 3, 0, 100);
        assert_eq!(req.degree_filter, Some(2));
        assert_eq!(req.limit, 1);
        assert_eq!(req.offset(), 2);
    }

    #[test]
    fn test_pagination_fields() {
        let first_empty = Pagination::new(1, 20, 0, false);
        assert!(first_empty.is_up_to_date);
        assert_eq!(first_empty.next_page, None);

        let third = Pagination::new(3, 10, 10, true);
        assert_eq!(third.total_fetched, 30);
        assert_eq!(third.next_page, Some(4));
        assert!(!third.is_up_to_date);

        let value = serde_json::to_value(&third).unwrap();
        assert_eq!(
            value,
            json!({
                "currentPage": 3,
                "limit": 10,
                "hasMore": true,
                "totalFetched": 30,
                "isUpToDate": false,
                "nextPage": 4
            })
        );
        let value = serde_json::to_value(&first_empty).unwrap();
        assert!(value.get("nextPage").is_none());

        let huge = Pagination::new(usize::MAX, 20, 0, true);
        assert_eq!(huge.total_fetched, usize::MAX);
        assert_eq!(huge.next_page, Some(usize::MAX));
    }

    #[test]
    fn test_post_serializes_degree_as_string() {
        let post = FeedPost {
            id: "p1".into(),
            user_id: "bob".into(),
            content: "hi".into(),
            category: None,
            hide_from_chat: false,
            expires_at: None,
            locked: false,
            created_at: "2026-01-01T00:00:00Z".into(),
            connection_type: Some("2".into()),
            viewer_degree: 1,
            user_interested: false,
            user_accepted: false,
            mutual_count: 3,
        };
        let value = serde_json::to_value(&post).unwrap();
        assert_eq!(value["connectionType"], json!("1"));
        assert_eq!(value["connection_type"], json!("2"));
        assert_eq!(value["mutual_count"], json!(3));
    }

    #[test]
    fn test_owners_keep_viewer_under_filter() {
        let mut elig = Eligibility::default();
        elig.degrees.insert("me".into(), 0);
        elig.degrees.insert("b".into(), 1);
        elig.degrees.insert("c".into(), 2);
        assert_eq!(elig.owners("me", None), vec!["b", "c", "me"]);
        assert_eq!(elig.owners("me", Some(2)), vec!["c", "me"]);
        assert_eq!(elig.owners("me", Some(3)), vec!["me"]);
    }
}
