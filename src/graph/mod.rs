//! Relationship graph: user nodes, directed CONNECTED_TO edges and
//! bounded-depth traversal.
//!
//! Traversals are recursive CTEs evaluated by the graph store. Rust only
//! marshals parameters and shapes rows.

mod store;
mod traversal;

pub use store::GraphStore;
pub use traversal::{chat_peers, reachable_from};
pub(crate) use traversal::reach_cte;

use serde::{Deserialize, Serialize};

/// Longest path, in hops, that still counts as connected.
pub const MAX_DEPTH: u32 = 3;

/// A `User` node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNode {
    pub id: String,
    pub name: Option<String>,
    pub phone: Option<String>,
}

/// A user reachable from the queried user, tagged with the shortest directed distance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reachable {
    pub connection_id: String,
    pub degree: u32,
}

/// A user reachable from both parties; `degree` is measured from the first party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutualConnection {
    pub mutual_id: String,
    pub degree: u32,
}

/// Degree plus mutual count for one ordered pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionDetails {
    pub mutual_count: usize,
    /// `None` when no path of length <= 3 exists.
    pub connection_degree: Option<u32>,
}

/// Number of CONNECTED_TO rows created or removed by a write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeChange {
    pub affected: usize,
}
