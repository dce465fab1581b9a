use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use futures_util::future::try_join_all;
use rusqlite::params;

use crate::cache::DegreeCache;
use crate::config::{EligibilitySource, EngineConfig};
use crate::db::Db;
use crate::error::Result;
use crate::feed::query::{AggregatedPostQuery, FilteredPostQuery, PostCriteria, PostQuery};
use crate::feed::{Eligibility, FeedPage, FeedPost, FeedRequest, Pagination};
use crate::graph::{chat_peers, reachable_from, GraphStore};

/// Paging bounds and eligibility source for the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSettings {
    pub default_page_limit: usize,
    pub max_page_limit: usize,
    pub eligibility: EligibilitySource,
}

impl Default for FeedSettings {
    fn default() -> Self {
        FeedSettings::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for FeedSettings {
    fn from(engine: &EngineConfig) -> Self {
        Self {
            default_page_limit: engine.default_page_limit,
            max_page_limit: engine.max_page_limit,
            eligibility: engine.eligibility,
        }
    }
}

/// Assembles paged, visibility-filtered feeds.
#[derive(Clone)]
pub struct FeedEngine {
    graph: GraphStore,
    cache: DegreeCache,
    store: Db,
    primary: Arc<dyn PostQuery>,
    fallback: Arc<dyn PostQuery>,
    settings: FeedSettings,
}

impl FeedEngine {
    pub fn new(graph: GraphStore, cache: DegreeCache, store: Db, settings: FeedSettings) -> Self {
        Self {
            primary: Arc::new(AggregatedPostQuery::new(store.clone())),
            fallback: Arc::new(FilteredPostQuery::new(store.clone())),
            graph,
            cache,
            store,
            settings,
        }
    }

    /// Swap the post query strategies.
    pub fn with_queries(mut self, primary: Arc<dyn PostQuery>, fallback: Arc<dyn PostQuery>) -> Self {
        self.primary = primary;
        self.fallback = fallback;
        self
    }

    pub fn settings(&self) -> &FeedSettings {
        &self.settings
    }

    /// Degree map (viewer included at 0) and chat peers for `user_id`.
    pub async fn eligibility(&self, user_id: &str) -> Result<Eligibility> {
        let mut eligibility = Eligibility::default();
        match self.settings.eligibility {
            EligibilitySource::Live => {
                let owner = user_id.to_string();
                let (reach, chat) = self
                    .graph
                    .session("feed_eligibility", move |conn| {
                        Ok((reachable_from(conn, &owner)?, chat_peers(conn, &owner)?))
                    })
                    .await?;
                eligibility.degrees.extend(reach.into_iter().map(|r| (r.connection_id, r.degree)));
                eligibility.chat.extend(chat);
            }
            EligibilitySource::Cached => {
                for row in self.cache.read_all(user_id).await? {
                    if row.is_chat {
                        eligibility.chat.insert(row.connection_id.clone());
                    }
                    eligibility.degrees.insert(row.connection_id, row.degree);
                }
            }
        }
        eligibility.degrees.insert(user_id.to_string(), 0);
        Ok(eligibility)
    }

    /// One page of the viewer's feed, newest first.
    pub async fn get_feed(&self, request: &FeedRequest) -> Result<FeedPage> {
        let viewer = request.user_id.as_str();
        let eligibility = self.eligibility(viewer).await?;
        let eligible_ids = eligibility.owners(viewer, request.degree_filter);
        log::debug!(
            "Feed for {}: {} eligible owners, {} chat peers",
            viewer,
            eligible_ids.len(),
            eligibility.chat.len()
        );

        let criteria = PostCriteria {
            viewer_id: viewer.to_string(),
            eligible_ids,
            chat_ids: eligibility.chat,
            degrees: eligibility.degrees,
            offset: request.offset(),
            fetch_limit: request.limit + 1,
            degree_filter: request.degree_filter,
        };

        let mut posts = self.fetch_posts(&criteria).await?;
        let has_more = posts.len() > request.limit;
        posts.truncate(request.limit);

        let counts = self.mutual_counts(viewer, &posts).await?;
        for post in &mut posts {
            post.mutual_count = counts.get(&post.user_id).copied().unwrap_or(0);
        }

        let pagination = Pagination::new(request.page, request.limit, posts.len(), has_more);
        Ok(FeedPage { posts, pagination })
    }

    async fn fetch_posts(&self, criteria: &PostCriteria) -> Result<Vec<FeedPost>> {
        match self.primary.fetch(criteria).await {
            Ok(posts) => Ok(posts),
            Err(e) => {
                log::warn!(
                    "[get_feed] {} post query failed, using {} fallback: {}",
                    self.primary.name(),
                    self.fallback.name(),
                    e
                );
                self.fallback.fetch(criteria).await
            }
        }
    }

    /// Mutual count per distinct post owner, looked up concurrently.
    async fn mutual_counts(&self, viewer: &str, posts: &[FeedPost]) -> Result<HashMap<String, usize>> {
        let owners: HashSet<&str> = posts
            .iter()
            .map(|p| p.user_id.as_str())
            .filter(|owner| *owner != viewer)
            .collect();

        let lookups = owners.into_iter().map(|owner| async move {
            let count = self.graph.get_mutual_connections_count(viewer, owner).await?;
            Ok::<_, crate::error::SixgraphError>((owner.to_string(), count))
        });
        Ok(try_join_all(lookups).await?.into_iter().collect())
    }

    /// Posts authored by the eligible owners, before visibility filtering.
    pub async fn count_eligible_posts(&self, user_id: &str, degree_filter: Option<u32>) -> Result<usize> {
        let owners = self.eligibility(user_id).await?.owners(user_id, degree_filter);
        let owners = serde_json::to_string(&owners)?;
        self.store
            .session("count_eligible_posts", move |conn| {
                let count: usize = conn.query_row(
                    "SELECT COUNT(*) FROM posts WHERE user_id IN (SELECT value FROM json_each(?1))",
                    params![owners],
                    |row| row.get(0),
                )?;
                Ok(count)
            })
            .await
    }
}
