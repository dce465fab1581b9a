use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use rusqlite::{params, Connection, Row};

use crate::db::Db;
use crate::error::{Result, SixgraphError};
use crate::feed::visibility::{self, is_visible, VisibilityInput, POST_VISIBLE_FN};
use crate::feed::FeedPost;

/// Everything a post query needs to return one page (plus one look-ahead row).
#[derive(Debug, Clone, Default)]
pub struct PostCriteria {
    pub viewer_id: String,
    pub eligible_ids: Vec<String>,
    pub chat_ids: HashSet<String>,
    pub degrees: HashMap<String, u32>,
    pub offset: usize,
    /// Rows to return: page limit + 1.
    pub fetch_limit: usize,
    pub degree_filter: Option<u32>,
}

impl PostCriteria {
    fn degree_of(&self, owner: &str) -> u32 {
        self.degrees.get(owner).copied().unwrap_or(0)
    }
}

/// Port for fetching visible posts from the content store.
#[async_trait]
pub trait PostQuery: Send + Sync {
    /// Visible posts from eligible owners, newest first, with `mutual_count` unset.
    async fn fetch(&self, criteria: &PostCriteria) -> Result<Vec<FeedPost>>;

    fn name(&self) -> &'static str;
}

const POST_COLUMNS: &str = "p.id, p.user_id, p.content, p.category, p.hide_from_chat,
       p.expires_at, p.locked, p.created_at, p.connection_type,
       COALESCE(r.interest, 0), COALESCE(r.accepted, 0)";

fn post_from_row(row: &Row<'_>, viewer_degree: u32) -> rusqlite::Result<FeedPost> {
    Ok(FeedPost {
        id: row.get(0)?,
        user_id: row.get(1)?,
        content: row.get(2)?,
        category: row.get(3)?,
        hide_from_chat: row.get(4)?,
        expires_at: row.get(5)?,
        locked: row.get(6)?,
        created_at: row.get(7)?,
        connection_type: row.get(8)?,
        viewer_degree,
        user_interested: row.get(9)?,
        user_accepted: row.get(10)?,
        mutual_count: 0,
    })
}

fn to_i64(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

/// One statement over the content store: eligibility, visibility, reactions
/// and pagination all evaluated by SQLite.
#[derive(Debug, Clone)]
pub struct AggregatedPostQuery {
    store: Db,
}

impl AggregatedPostQuery {
    pub fn new(store: Db) -> Self {
        Self { store }
    }
}

fn aggregated_sql() -> String {
    format!(
        "WITH eligible(id) AS (SELECT value FROM json_each(?2)),
              chat(id) AS (SELECT value FROM json_each(?3)),
              degrees(id, degree) AS (SELECT key, value FROM json_each(?4))
         SELECT {columns}, COALESCE(d.degree, 0)
         FROM posts p
         JOIN eligible e ON e.id = p.user_id
         LEFT JOIN degrees d ON d.id = p.user_id
         LEFT JOIN post_reactions r ON r.post_id = p.id AND r.reactor_id = ?1
         WHERE {visible}(?1, p.user_id, COALESCE(d.degree, 0), p.connection_type,
                         p.hide_from_chat, p.user_id IN (SELECT id FROM chat))
           AND (?7 IS NULL OR p.user_id = ?1 OR COALESCE(d.degree, 0) = ?7)
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?6 OFFSET ?5",
        columns = POST_COLUMNS,
        visible = POST_VISIBLE_FN,
    )
}

fn is_missing_function(e: &rusqlite::Error) -> bool {
    e.to_string().contains("no such function")
}

#[async_trait]
impl PostQuery for AggregatedPostQuery {
    async fn fetch(&self, criteria: &PostCriteria) -> Result<Vec<FeedPost>> {
        let eligible = serde_json::to_string(&criteria.eligible_ids)?;
        let chat = serde_json::to_string(&criteria.chat_ids)?;
        let degrees = serde_json::to_string(&criteria.degrees)?;
        let viewer = criteria.viewer_id.clone();
        let offset = to_i64(criteria.offset);
        let fetch_limit = to_i64(criteria.fetch_limit);
        let degree_filter = criteria.degree_filter;

        self.store
            .session("aggregated_post_query", move |conn| {
                visibility::register(conn)?;
                let mut stmt = conn.prepare(&aggregated_sql()).map_err(|e| {
                    if is_missing_function(&e) {
                        SixgraphError::AggregationUnavailable(e.to_string())
                    } else {
                        SixgraphError::Database(e)
                    }
                })?;
                let rows = stmt.query_map(
                    params![viewer, eligible, chat, degrees, offset, fetch_limit, degree_filter],
                    |row| {
                        let degree: u32 = row.get(11)?;
                        post_from_row(row, degree)
                    },
                )?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await
    }

    fn name(&self) -> &'static str {
        "aggregated"
    }
}

/// Fetches an over-sized recency window from eligible owners and filters it
/// in Rust with the same visibility rule.
///
/// The window is `(fetch_limit) * max(3, ceil(100 / eligible))` rows past the
/// offset, so pages far into a heavily filtered feed can come back short.
#[derive(Debug, Clone)]
pub struct FilteredPostQuery {
    store: Db,
}

impl FilteredPostQuery {
    pub fn new(store: Db) -> Self {
        Self { store }
    }

    pub fn batch_size(fetch_limit: usize, eligible: usize) -> usize {
        let multiplier = 100usize.div_ceil(eligible.max(1)).max(3);
        fetch_limit.saturating_mul(multiplier)
    }
}

#[async_trait]
impl PostQuery for FilteredPostQuery {
    async fn fetch(&self, criteria: &PostCriteria) -> Result<Vec<FeedPost>> {
        let window = criteria
            .offset
            .saturating_add(Self::batch_size(criteria.fetch_limit, criteria.eligible_ids.len()))
            .saturating_add(1);
        let eligible = serde_json::to_string(&criteria.eligible_ids)?;
        let viewer = criteria.viewer_id.clone();

        let candidates = self
            .store
            .session("filtered_post_query", move |conn| recent_posts(conn, &viewer, &eligible, window))
            .await?;

        Ok(candidates
            .into_iter()
            .filter_map(|mut post| {
                post.viewer_degree = criteria.degree_of(&post.user_id);
                let visible = is_visible(&VisibilityInput {
                    viewer_id: &criteria.viewer_id,
                    owner_id: &post.user_id,
                    viewer_degree: post.viewer_degree,
                    connection_type: post.connection_type.as_deref(),
                    hide_from_chat: post.hide_from_chat,
                    owner_in_chat: criteria.chat_ids.contains(&post.user_id),
                });
                visible.then_some(post)
            })
            .skip(criteria.offset)
            .take(criteria.fetch_limit)
            .collect())
    }

    fn name(&self) -> &'static str {
        "filtered"
    }
}

fn recent_posts(conn: &Connection, viewer: &str, eligible_json: &str, window: usize) -> Result<Vec<FeedPost>> {
    let sql = format!(
        "SELECT {columns}
         FROM posts p
         LEFT JOIN post_reactions r ON r.post_id = p.id AND r.reactor_id = ?1
         WHERE p.user_id IN (SELECT value FROM json_each(?2))
         ORDER BY p.created_at DESC, p.id DESC
         LIMIT ?3",
        columns = POST_COLUMNS,
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![viewer, eligible_json, to_i64(window)], |row| post_from_row(row, 0))?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}
