//! Pending connection requests: interested, not yet accepted reactions on a
//! user's posts, enriched with the reactor's graph position.

use std::collections::{BTreeSet, HashMap};

use futures_util::future::try_join_all;
use rusqlite::params;
use serde::Serialize;

use crate::db::Db;
use crate::error::{Result, SixgraphError};
use crate::graph::{ConnectionDetails, GraphStore};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionRequest {
    pub id: String,
    pub post_id: String,
    pub reactor_id: String,
    pub post_owner_id: String,
    pub post_content: String,
    pub created_at: String,
    /// Reactor's degree to the owner; `None` beyond three hops.
    pub degree: Option<u32>,
    pub mutuals: usize,
}

#[derive(Debug, Clone)]
pub struct ConnectionRequests {
    graph: GraphStore,
    store: Db,
}

impl ConnectionRequests {
    pub fn new(graph: GraphStore, store: Db) -> Self {
        Self { graph, store }
    }

    /// Requests on posts owned by `owner_id`, newest first.
    ///
    /// Each distinct reactor is looked up once; lookups run concurrently.
    pub async fn list(&self, owner_id: &str) -> Result<Vec<ConnectionRequest>> {
        let owner = owner_id.to_string();
        let mut requests = self
            .store
            .session("list_connection_requests", move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT r.id, r.post_id, r.reactor_id, r.post_owner_id, p.content, r.created_at
                     FROM post_reactions r
                     JOIN posts p ON p.id = r.post_id
                     WHERE r.post_owner_id = ?1 AND r.interest = 1 AND r.accepted = 0
                     ORDER BY r.created_at DESC, r.id",
                )?;
                let rows = stmt.query_map(params![owner], |row| {
                    Ok(ConnectionRequest {
                        id: row.get(0)?,
                        post_id: row.get(1)?,
                        reactor_id: row.get(2)?,
                        post_owner_id: row.get(3)?,
                        post_content: row.get(4)?,
                        created_at: row.get(5)?,
                        degree: None,
                        mutuals: 0,
                    })
                })?;
                Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
            })
            .await?;

        let reactors: BTreeSet<&str> = requests.iter().map(|r| r.reactor_id.as_str()).collect();
        let lookups = reactors.into_iter().map(|reactor| async move {
            let details = self.graph.connection_details(reactor, owner_id).await?;
            Ok::<_, SixgraphError>((reactor.to_string(), details))
        });
        let details: HashMap<String, ConnectionDetails> = try_join_all(lookups).await?.into_iter().collect();

        for request in &mut requests {
            if let Some(d) = details.get(&request.reactor_id) {
                request.degree = d.connection_degree;
                request.mutuals = d.mutual_count;
            }
        }
        Ok(requests)
    }
}
