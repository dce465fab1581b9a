//! Bounded-depth traversal over CONNECTED_TO.

use rusqlite::{params, Connection};

use crate::error::Result;
use crate::graph::{ConnectionDetails, GraphStore, MutualConnection, Reachable, MAX_DEPTH};

/// Recursive CTE `name(node_id, depth)`: every node reachable from the user
/// bound to `param` in 1..=MAX_DEPTH forward hops. One row per (node, depth)
/// pair, so callers take `MIN(depth)`.
pub(crate) fn reach_cte(name: &str, param: &str) -> String {
    format!(
        "{name}(node_id, depth) AS (
            SELECT target_id, 1 FROM connected_to WHERE source_id = {param}
            UNION
            SELECT c.target_id, r.depth + 1
            FROM {name} r JOIN connected_to c ON c.source_id = r.node_id
            WHERE r.depth < {max}
        )",
        name = name,
        param = param,
        max = MAX_DEPTH,
    )
}

fn mutuals_sql() -> String {
    format!(
        "WITH RECURSIVE {}, {}
         SELECT a.node_id, MIN(a.depth) AS degree
         FROM reach_a a
         WHERE a.node_id NOT IN (?1, ?2)
           AND EXISTS (SELECT 1 FROM reach_b b WHERE b.node_id = a.node_id)
         GROUP BY a.node_id",
        reach_cte("reach_a", "?1"),
        reach_cte("reach_b", "?2"),
    )
}

/// Nodes reachable from `user_id` within MAX_DEPTH hops, minimum degree each, self excluded.
pub fn reachable_from(conn: &Connection, user_id: &str) -> Result<Vec<Reachable>> {
    let sql = format!(
        "WITH RECURSIVE {}
         SELECT node_id, MIN(depth) AS degree FROM reach
         WHERE node_id <> ?1
         GROUP BY node_id
         ORDER BY degree, node_id",
        reach_cte("reach", "?1"),
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![user_id], |row| {
            Ok(Reachable {
                connection_id: row.get(0)?,
                degree: row.get::<_, u32>(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

/// Peers with edges in both directions to `user_id`.
pub fn chat_peers(conn: &Connection, user_id: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT o.target_id
         FROM connected_to o
         JOIN connected_to i ON i.source_id = o.target_id AND i.target_id = o.source_id
         WHERE o.source_id = ?1 AND o.target_id <> ?1
         ORDER BY o.target_id",
    )?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(ids)
}

fn shortest_undirected(conn: &Connection, a: &str, b: &str) -> Result<Option<u32>> {
    if a == b {
        return Ok(None);
    }
    let sql = format!(
        "WITH RECURSIVE
            adjacent(a, b) AS (
                SELECT source_id, target_id FROM connected_to
                UNION
                SELECT target_id, source_id FROM connected_to
            ),
            walk(node_id, depth) AS (
                SELECT b, 1 FROM adjacent WHERE a = ?1
                UNION
                SELECT j.b, w.depth + 1
                FROM walk w JOIN adjacent j ON j.a = w.node_id
                WHERE w.depth < {}
            )
         SELECT MIN(depth) FROM walk WHERE node_id = ?2",
        MAX_DEPTH
    );
    let degree: Option<u32> = conn.query_row(&sql, params![a, b], |row| row.get(0))?;
    Ok(degree)
}

fn mutual_connections(conn: &Connection, a: &str, b: &str) -> Result<Vec<MutualConnection>> {
    let sql = format!("{} ORDER BY degree, a.node_id", mutuals_sql());
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params![a, b], |row| {
            Ok(MutualConnection {
                mutual_id: row.get(0)?,
                degree: row.get::<_, u32>(1)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
    Ok(rows)
}

pub(crate) fn mutual_count(conn: &Connection, a: &str, b: &str) -> Result<usize> {
    let sql = format!("SELECT COUNT(*) FROM ({})", mutuals_sql());
    let count: usize = conn.query_row(&sql, params![a, b], |row| row.get(0))?;
    Ok(count)
}

impl GraphStore {
    /// Everyone reachable from `user_id` within three forward hops.
    ///
    /// An empty vector is a successful answer: the user has no outbound path.
    pub async fn get_connections(&self, user_id: &str) -> Result<Vec<Reachable>> {
        let user_id = user_id.to_string();
        self.session("get_connections", move |conn| reachable_from(conn, &user_id))
            .await
    }

    /// Bidirectionally connected peers of `user_id`.
    pub async fn get_chat_peers(&self, user_id: &str) -> Result<Vec<String>> {
        let user_id = user_id.to_string();
        self.session("get_chat_peers", move |conn| chat_peers(conn, &user_id))
            .await
    }

    /// Shortest path length between `a` and `b`, ignoring edge direction.
    ///
    /// `Ok(None)` means no path of length <= 3; that is not an error.
    pub async fn get_connection_degree(&self, a: &str, b: &str) -> Result<Option<u32>> {
        let (a, b) = (a.to_string(), b.to_string());
        self.session("get_connection_degree", move |conn| shortest_undirected(conn, &a, &b))
            .await
    }

    /// Nodes both `a` and `b` reach within three forward hops.
    ///
    /// Not symmetric: `degree` is always the distance from `a`.
    pub async fn get_mutual_connections(&self, a: &str, b: &str) -> Result<Vec<MutualConnection>> {
        let (a, b) = (a.to_string(), b.to_string());
        self.session("get_mutual_connections", move |conn| mutual_connections(conn, &a, &b))
            .await
    }

    pub async fn get_mutual_connections_count(&self, a: &str, b: &str) -> Result<usize> {
        let (a, b) = (a.to_string(), b.to_string());
        self.session("get_mutual_connections_count", move |conn| mutual_count(conn, &a, &b))
            .await
    }

    /// Mutual count and undirected degree for one pair, in one session.
    pub async fn connection_details(&self, a: &str, b: &str) -> Result<ConnectionDetails> {
        let (a, b) = (a.to_string(), b.to_string());
        self.session("connection_details", move |conn| {
            Ok(ConnectionDetails {
                mutual_count: mutual_count(conn, &a, &b)?,
                connection_degree: shortest_undirected(conn, &a, &b)?,
            })
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{graph_fixture, link, link_both, scenario_graph, user};

    #[tokio::test]
    async fn test_scenario_degree_and_chat() {
        let (graph, _temp) = scenario_graph().await;

        assert_eq!(graph.get_connection_degree("alice", "carol").await.unwrap(), Some(2));
        assert_eq!(graph.get_connection_degree("carol", "alice").await.unwrap(), Some(2));
        assert_eq!(graph.get_chat_peers("alice").await.unwrap(), vec!["bob".to_string()]);
        assert!(graph.get_chat_peers("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_connections_exclude_self_and_take_min_degree() {
        let (graph, _temp) = scenario_graph().await;

        let conns = graph.get_connections("alice").await.unwrap();
        assert_eq!(
            conns,
            vec![
                Reachable { connection_id: "bob".into(), degree: 1 },
                Reachable { connection_id: "carol".into(), degree: 2 },
            ]
        );
    }

    #[tokio::test]
    async fn test_connections_bounded_to_three_hops() {
        let (graph, _temp) = graph_fixture().await;
        for id in ["u1", "u2", "u3", "u4", "u5"] {
            graph.upsert_user(user(id)).await.unwrap();
        }
        link(&graph, "u1", "u2").await;
        link(&graph, "u2", "u3").await;
        link(&graph, "u3", "u4").await;
        link(&graph, "u4", "u5").await;
        // shortcut makes u3 reachable at 1 as well as 2
        link(&graph, "u1", "u3").await;

        let conns = graph.get_connections("u1").await.unwrap();
        assert!(conns.iter().all(|c| (1..=MAX_DEPTH).contains(&c.degree)));
        assert!(conns.iter().all(|c| c.connection_id != "u1"));
        let u3 = conns.iter().find(|c| c.connection_id == "u3").unwrap();
        assert_eq!(u3.degree, 1);
        let u5 = conns.iter().find(|c| c.connection_id == "u5").unwrap();
        assert_eq!(u5.degree, 3);

        // u2 -> u3 -> u4 -> u5 is three hops; u2 never reaches beyond that
        assert_eq!(graph.get_connection_degree("u1", "u5").await.unwrap(), Some(3));
        link(&graph, "u5", "u1").await;
        let from_u2 = graph.get_connections("u2").await.unwrap();
        assert!(from_u2.iter().all(|c| c.connection_id != "u1"));
    }

    #[tokio::test]
    async fn test_degree_not_found_beyond_three() {
        let (graph, _temp) = graph_fixture().await;
        for id in ["a", "b", "c", "d", "e"] {
            graph.upsert_user(user(id)).await.unwrap();
        }
        link(&graph, "a", "b").await;
        link(&graph, "b", "c").await;
        link(&graph, "c", "d").await;
        link(&graph, "d", "e").await;

        assert_eq!(graph.get_connection_degree("a", "d").await.unwrap(), Some(3));
        assert_eq!(graph.get_connection_degree("a", "e").await.unwrap(), None);
        assert_eq!(graph.get_connection_degree("a", "a").await.unwrap(), None);
        assert_eq!(graph.get_connection_degree("a", "nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_mutuals_are_directed_and_asymmetric() {
        let (graph, _temp) = graph_fixture().await;
        for id in ["a", "b", "x", "y"] {
            graph.upsert_user(user(id)).await.unwrap();
        }
        // a reaches y in 2 hops, b reaches y directly
        link(&graph, "a", "x").await;
        link(&graph, "x", "y").await;
        link(&graph, "b", "x").await;
        link(&graph, "b", "y").await;

        let from_a = graph.get_mutual_connections("a", "b").await.unwrap();
        let from_b = graph.get_mutual_connections("b", "a").await.unwrap();
        let degree_of = |list: &[MutualConnection], id: &str| {
            list.iter().find(|m| m.mutual_id == id).map(|m| m.degree)
        };
        assert_eq!(degree_of(&from_a, "y"), Some(2));
        assert_eq!(degree_of(&from_b, "y"), Some(1));
        assert_eq!(from_a.len(), 2);
    }

    #[tokio::test]
    async fn test_mutual_count_matches_list() {
        let (graph, _temp) = graph_fixture().await;
        for i in 1..=8 {
            graph.upsert_user(user(&format!("user{}", i))).await.unwrap();
        }
        for i in 1..=8 {
            for j in (i + 1)..=(i + 3).min(8) {
                link(&graph, &format!("user{}", i), &format!("user{}", j)).await;
            }
        }
        link_both(&graph, "user8", "user1").await;

        for (a, b) in [("user1", "user2"), ("user2", "user1"), ("user3", "user8"), ("user1", "user8")] {
            let list = graph.get_mutual_connections(a, b).await.unwrap();
            let count = graph.get_mutual_connections_count(a, b).await.unwrap();
            assert_eq!(count, list.len(), "pair {}/{}", a, b);
            assert!(list.iter().all(|m| m.mutual_id != a && m.mutual_id != b));
        }
    }

    #[tokio::test]
    async fn test_scenario_mutuals_follow_forward_edges() {
        let (graph, _temp) = scenario_graph().await;
        // carol has no outbound edges, so nothing is reachable from both
        assert_eq!(graph.get_mutual_connections_count("alice", "carol").await.unwrap(), 0);
        // bob reaches alice and carol; alice reaches carol: carol is mutual
        let m = graph.get_mutual_connections("alice", "bob").await.unwrap();
        assert_eq!(m, vec![MutualConnection { mutual_id: "carol".into(), degree: 2 }]);
    }

    #[tokio::test]
    async fn test_connection_details() {
        let (graph, _temp) = scenario_graph().await;
        let details = graph.connection_details("alice", "bob").await.unwrap();
        assert_eq!(details.connection_degree, Some(1));
        assert_eq!(details.mutual_count, 1);
    }
}
