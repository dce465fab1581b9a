//! Graph store adapter: session scoping and node/edge writes.

use rusqlite::{params, Connection, OptionalExtension};

use crate::db::Db;
use crate::error::{Result, SixgraphError};
use crate::graph::{EdgeChange, UserNode};

/// Session-scoped client to the graph database.
///
/// Cheap to clone; every operation opens its own session.
#[derive(Debug, Clone)]
pub struct GraphStore {
    db: Db,
}

impl GraphStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }

    /// Run `f` inside a scoped graph session named after `operation`.
    pub async fn session<F, T>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        self.db.session(operation, f).await
    }

    /// Create the node, or update name/phone if the id already exists.
    pub async fn upsert_user(&self, user: UserNode) -> Result<UserNode> {
        if user.id.trim().is_empty() {
            return Err(SixgraphError::InvalidInput("user id must not be empty".to_string()));
        }
        self.session("create_user_node", move |conn| {
            conn.execute(
                "INSERT INTO user_nodes (id, name, phone) VALUES (?1, ?2, ?3)
                 ON CONFLICT(id) DO UPDATE SET name = excluded.name, phone = excluded.phone",
                params![user.id, user.name, user.phone],
            )?;
            Ok(user)
        })
        .await
    }

    pub async fn get_user(&self, user_id: &str) -> Result<Option<UserNode>> {
        let user_id = user_id.to_string();
        self.session("get_user_node", move |conn| {
            let user = conn
                .query_row(
                    "SELECT id, name, phone FROM user_nodes WHERE id = ?1",
                    params![user_id],
                    |row| {
                        Ok(UserNode {
                            id: row.get(0)?,
                            name: row.get(1)?,
                            phone: row.get(2)?,
                        })
                    },
                )
                .optional()?;
            Ok(user)
        })
        .await
    }

    /// All node ids, ordered.
    pub async fn list_user_ids(&self) -> Result<Vec<String>> {
        self.session("list_user_ids", |conn| {
            let mut stmt = conn.prepare("SELECT id FROM user_nodes ORDER BY id")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
            Ok(ids)
        })
        .await
    }

    /// Idempotently create `from -> to`. A no-op when either node is missing.
    pub async fn add_connection(&self, from: &str, to: &str) -> Result<EdgeChange> {
        let (from, to) = distinct_pair(from, to)?;
        self.session("add_connection", move |conn| {
            let affected = merge_edge(conn, &from, &to)?;
            Ok(EdgeChange { affected })
        })
        .await
    }

    /// Idempotently create both `a -> b` and `b -> a` in one transaction.
    pub async fn create_bidirectional_connection(&self, a: &str, b: &str) -> Result<EdgeChange> {
        let (a, b) = distinct_pair(a, b)?;
        self.session("create_bidirectional_connection", move |conn| {
            let tx = conn.transaction()?;
            let affected = merge_edge(&tx, &a, &b)? + merge_edge(&tx, &b, &a)?;
            tx.commit()?;
            Ok(EdgeChange { affected })
        })
        .await
    }

    /// Delete `from -> to` only. The reverse edge, if any, is left alone.
    pub async fn disconnect_one_way(&self, from: &str, to: &str) -> Result<EdgeChange> {
        let (from, to) = (from.to_string(), to.to_string());
        self.session("disconnect_one_way", move |conn| {
            let affected = conn.execute(
                "DELETE FROM connected_to WHERE source_id = ?1 AND target_id = ?2",
                params![from, to],
            )?;
            Ok(EdgeChange { affected })
        })
        .await
    }

    /// Delete both directions, but only when both exist. Otherwise nothing changes.
    pub async fn disconnect_mutual(&self, a: &str, b: &str) -> Result<EdgeChange> {
        let (a, b) = (a.to_string(), b.to_string());
        self.session("disconnect_mutual", move |conn| {
            let tx = conn.transaction()?;
            let present: usize = tx.query_row(
                "SELECT COUNT(*) FROM connected_to
                 WHERE (source_id = ?1 AND target_id = ?2) OR (source_id = ?2 AND target_id = ?1)",
                params![a, b],
                |row| row.get(0),
            )?;
            let affected = if present == 2 && a != b {
                tx.execute(
                    "DELETE FROM connected_to
                     WHERE (source_id = ?1 AND target_id = ?2) OR (source_id = ?2 AND target_id = ?1)",
                    params![a, b],
                )?
            } else {
                0
            };
            tx.commit()?;
            Ok(EdgeChange { affected })
        })
        .await
    }
}

fn distinct_pair(a: &str, b: &str) -> Result<(String, String)> {
    if a == b {
        return Err(SixgraphError::InvalidInput(format!("cannot connect {} to itself", a)));
    }
    Ok((a.to_string(), b.to_string()))
}

fn merge_edge(conn: &Connection, from: &str, to: &str) -> Result<usize> {
    let n = conn.execute(
        "INSERT OR IGNORE INTO connected_to (source_id, target_id)
         SELECT ?1, ?2
         WHERE EXISTS (SELECT 1 FROM user_nodes WHERE id = ?1)
           AND EXISTS (SELECT 1 FROM user_nodes WHERE id = ?2)",
        params![from, to],
    )?;
    Ok(n)
}
