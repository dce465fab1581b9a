//! Fixtures shared by the unit tests: migrated temp databases, the
//! alice/bob/carol scenario graph and post/reaction seeding.

use std::path::{Path, PathBuf};

use rusqlite::params;
use tempfile::TempDir;

use crate::cache::DegreeCache;
use crate::db::migrate::{migrate, GRAPH_MIGRATIONS, STORE_MIGRATIONS};
use crate::db::Db;
use crate::feed::{FeedEngine, FeedSettings};
use crate::graph::{GraphStore, UserNode};

pub struct Fixture {
    pub graph: GraphStore,
    pub store: Db,
    pub cache: DegreeCache,
    pub temp: TempDir,
}

impl Fixture {
    pub fn feed(&self) -> FeedEngine {
        self.feed_with(FeedSettings::default())
    }

    pub fn feed_with(&self, settings: FeedSettings) -> FeedEngine {
        FeedEngine::new(self.graph.clone(), self.cache.clone(), self.store.clone(), settings)
    }
}

fn migrations_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("migrations")
}

async fn migrated(temp: &TempDir, file: &str, subdir: &str) -> Db {
    let db = Db::new(temp.path().join(file));
    migrate(&db, &migrations_root(), subdir).await.unwrap();
    db
}

pub async fn graph_fixture() -> (GraphStore, TempDir) {
    let temp = TempDir::new().unwrap();
    let graph = GraphStore::new(migrated(&temp, "graph.db", GRAPH_MIGRATIONS).await);
    (graph, temp)
}

pub async fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let graph = GraphStore::new(migrated(&temp, "graph.db", GRAPH_MIGRATIONS).await);
    let store = migrated(&temp, "store.db", STORE_MIGRATIONS).await;
    let cache = DegreeCache::new(graph.clone(), store.clone(), true);
    Fixture { graph, store, cache, temp }
}

/// alice -> bob, bob -> alice, bob -> carol
async fn seed_scenario(graph: &GraphStore) {
    for id in ["alice", "bob", "carol"] {
        graph.upsert_user(user(id)).await.unwrap();
    }
    link_both(graph, "alice", "bob").await;
    link(graph, "bob", "carol").await;
}

pub async fn scenario_graph() -> (GraphStore, TempDir) {
    let (graph, temp) = graph_fixture().await;
    seed_scenario(&graph).await;
    (graph, temp)
}

pub async fn scenario_fixture() -> Fixture {
    let fx = fixture().await;
    seed_scenario(&fx.graph).await;
    fx
}

pub fn user(id: &str) -> UserNode {
    UserNode {
        id: id.to_string(),
        name: None,
        phone: None,
    }
}

pub async fn link(graph: &GraphStore, from: &str, to: &str) {
    graph.add_connection(from, to).await.unwrap();
}

pub async fn link_both(graph: &GraphStore, a: &str, b: &str) {
    graph.create_bidirectional_connection(a, b).await.unwrap();
}

/// A post row to insert; unset fields take the schema defaults.
#[derive(Debug, Clone)]
pub struct PostSeed {
    pub id: String,
    pub owner: String,
    pub connection_type: Option<String>,
    pub hide_from_chat: bool,
    pub created_at: String,
}

pub fn post(id: &str, owner: &str, created_at: &str) -> PostSeed {
    PostSeed {
        id: id.to_string(),
        owner: owner.to_string(),
        connection_type: None,
        hide_from_chat: false,
        created_at: created_at.to_string(),
    }
}

impl PostSeed {
    pub fn ceiling(mut self, connection_type: &str) -> Self {
        self.connection_type = Some(connection_type.to_string());
        self
    }

    pub fn hidden_from_chat(mut self) -> Self {
        self.hide_from_chat = true;
        self
    }
}

pub async fn insert_post(store: &Db, seed: PostSeed) {
    store
        .with_connection(move |conn| {
            conn.execute(
                "INSERT INTO posts (id, user_id, content, hide_from_chat, connection_type, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    seed.id,
                    seed.owner,
                    format!("post {}", seed.id),
                    seed.hide_from_chat,
                    seed.connection_type,
                    seed.created_at
                ],
            )?;
            Ok(())
        })
        .await
        .unwrap();
}

pub async fn insert_reaction(
    store: &Db,
    id: &str,
    post_id: &str,
    reactor: &str,
    owner: &str,
    interest: bool,
    accepted: bool,
) {
    let (id, post_id, reactor, owner) =
        (id.to_string(), post_id.to_string(), reactor.to_string(), owner.to_string());
    store
        .with_connection(move |conn| {
            conn.execute(
                "INSERT INTO post_reactions (id, post_id, reactor_id, post_owner_id, interest, accepted)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![id, post_id, reactor, owner, interest, accepted],
            )?;
            Ok(())
        })
        .await
        .unwrap();
}
