use std::sync::Arc;
use std::time::Instant;

use chrono::{SecondsFormat, Utc};
use rusqlite::params;

use crate::cache::page::{read_page, CacheTable, RawPage, HAS_DEGREE, MIRROR};
use crate::cache::{CachePage, CacheReadOptions, CacheSource, CachedConnection, MaterializeReport, UserLocks};
use crate::db::Db;
use crate::error::Result;
use crate::graph::{reach_cte, GraphStore};

/// Builds and serves the HAS_DEGREE cache.
#[derive(Debug, Clone)]
pub struct DegreeCache {
    graph: GraphStore,
    store: Db,
    locks: Arc<UserLocks>,
    mirror_enabled: bool,
}

impl DegreeCache {
    pub fn new(graph: GraphStore, store: Db, mirror_enabled: bool) -> Self {
        Self {
            graph,
            store,
            locks: Arc::new(UserLocks::new()),
            mirror_enabled,
        }
    }

    /// Rebuild the cache for `user_id` from scratch.
    ///
    /// Delete and insert run in one graph transaction, so a failure leaves the
    /// previous cache untouched. Rebuilds of the same user are serialized.
    /// The mirror is refreshed afterwards on a best-effort basis.
    pub async fn materialize(&self, user_id: &str) -> Result<MaterializeReport> {
        let _guard = self.locks.acquire(user_id).await;
        let started = Instant::now();

        let owner = user_id.to_string();
        let updated_at = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let cached = self
            .graph
            .session("materialize_degree_cache", move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM has_degree WHERE source_id = ?1", params![owner])?;
                let inserted = tx.execute(&rebuild_sql(), params![owner, updated_at])?;
                tx.commit()?;
                Ok(inserted)
            })
            .await?;

        let (mirrored, mirror_error) = if self.mirror_enabled {
            match self.refresh_mirror(user_id, cached).await {
                Ok(n) => (n, None),
                Err(e) => {
                    log::warn!("[materialize] mirror refresh for {} failed: {}", user_id, e);
                    if let Err(clear) = self.clear_mirror(user_id).await {
                        log::warn!("[materialize] could not clear stale mirror rows for {}: {}", user_id, clear);
                    }
                    (0, Some(e.to_string()))
                }
            }
        } else {
            (0, None)
        };

        let elapsed_ms = started.elapsed().as_millis() as u64;
        log::info!(
            "Materialized {} degree edges for {} in {}ms ({} mirrored)",
            cached, user_id, elapsed_ms, mirrored
        );

        Ok(MaterializeReport {
            user_id: user_id.to_string(),
            cached,
            elapsed_ms,
            mirrored,
            mirror_error,
        })
    }

    /// Copy the committed graph cache into the content store, replacing the user's rows.
    async fn refresh_mirror(&self, user_id: &str, expected: usize) -> Result<usize> {
        let opts = CacheReadOptions {
            limit: expected.max(1),
            ..CacheReadOptions::all()
        };
        let rows = self.read_table(self.graph.db(), HAS_DEGREE, user_id, opts).await?.rows;

        let owner = user_id.to_string();
        self.store
            .session("mirror_degree_cache", move |conn| {
                let tx = conn.transaction()?;
                tx.execute("DELETE FROM user_connections WHERE user_id = ?1", params![owner])?;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO user_connections
                            (user_id, connection_id, degree, mutuals, is_chat, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    )?;
                    for row in &rows {
                        stmt.execute(params![
                            owner,
                            row.connection_id,
                            row.degree,
                            row.mutuals,
                            row.is_chat,
                            row.updated_at
                        ])?;
                    }
                }
                tx.commit()?;
                Ok(rows.len())
            })
            .await
    }

    /// Drop the user's mirrored rows so reads go to the fresh graph cache.
    async fn clear_mirror(&self, user_id: &str) -> Result<usize> {
        let owner = user_id.to_string();
        self.store
            .session("clear_mirror", move |conn| {
                Ok(conn.execute("DELETE FROM user_connections WHERE user_id = ?1", params![owner])?)
            })
            .await
    }

    /// One page of the user's cached connections.
    ///
    /// Served from the mirror when it holds rows for the user, otherwise from
    /// the graph-side HAS_DEGREE edges.
    pub async fn read_cache(&self, user_id: &str, opts: CacheReadOptions) -> Result<CachePage> {
        if self.mirror_enabled {
            match self.read_table(&self.store, MIRROR, user_id, opts.clone()).await {
                Ok(page) if page.stored > 0 => return Ok(page.into_page(&opts, CacheSource::Mirror)),
                Ok(_) => log::debug!("No mirrored rows for {}, reading graph cache", user_id),
                Err(e) => log::warn!("[read_cache] mirror read for {} failed, reading graph cache: {}", user_id, e),
            }
        }
        let page = self.read_table(self.graph.db(), HAS_DEGREE, user_id, opts.clone()).await?;
        Ok(page.into_page(&opts, CacheSource::Graph))
    }

    /// Every cached row for the user.
    pub async fn read_all(&self, user_id: &str) -> Result<Vec<CachedConnection>> {
        Ok(self.read_cache(user_id, CacheReadOptions::all()).await?.connections)
    }

    async fn read_table(
        &self,
        db: &Db,
        table: CacheTable,
        user_id: &str,
        opts: CacheReadOptions,
    ) -> Result<RawPage> {
        let owner = user_id.to_string();
        db.session("read_degree_cache", move |conn| read_page(conn, table, &owner, &opts))
            .await
    }
}

/// One statement computing every HAS_DEGREE row for ?1, stamped with ?2.
///
/// degree: minimum forward distance (1..=3).
/// mutuals: users one hop (either direction) from both endpoints.
/// is_chat: edges exist in both directions between ?1 and the target.
fn rebuild_sql() -> String {
    format!(
        "WITH RECURSIVE {},
            adjacent(a, b) AS (
                SELECT source_id, target_id FROM connected_to
                UNION
                SELECT target_id, source_id FROM connected_to
            ),
            nearest(node_id, degree) AS (
                SELECT node_id, MIN(depth) FROM reach WHERE node_id <> ?1 GROUP BY node_id
            )
         INSERT INTO has_degree (source_id, target_id, degree, mutuals, is_chat, updated_at)
         SELECT ?1, n.node_id, n.degree,
                (SELECT COUNT(DISTINCT m.b)
                   FROM adjacent m
                   JOIN adjacent t ON t.a = m.b AND t.b = n.node_id
                  WHERE m.a = ?1 AND m.b NOT IN (?1, n.node_id)),
                EXISTS (SELECT 1 FROM connected_to WHERE source_id = ?1 AND target_id = n.node_id)
                  AND EXISTS (SELECT 1 FROM connected_to WHERE source_id = n.node_id AND target_id = ?1),
                ?2
         FROM nearest n",
        reach_cte("reach", "?1"),
    )
}
