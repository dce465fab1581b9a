use anyhow::Result;
use chrono::{Duration, SecondsFormat, Utc};
use clap::Parser;
use rusqlite::params;
use sixgraph::db::open_stores;
use sixgraph::graph::{GraphStore, UserNode};
use sixgraph::Config;
use std::path::PathBuf;
use uuid::Uuid;

/// Each user links forward to this many successors.
const FAN_OUT: usize = 3;

#[derive(Parser, Debug)]
#[command(name = "seed")]
#[command(about = "Create user1..userN, linking each user to the next three (idempotent)")]
struct Args {
    /// Number of users to create
    #[arg(short, long, default_value_t = 10)]
    users: usize,

    /// Sample posts to create per user
    #[arg(short, long, default_value_t = 0)]
    posts: usize,

    /// Directory holding the graph/ and store/ migrations
    #[arg(long, default_value = "migrations")]
    migrations: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().filter_or("RUST_LOG", "info")).init();

    let args = Args::parse();
    let config = Config::load()?;
    let (graph_db, store_db) = open_stores(&config, &args.migrations).await?;
    let graph = GraphStore::new(graph_db);

    for i in 1..=args.users {
        let id = format!("user{}", i);
        graph
            .upsert_user(UserNode {
                name: Some(format!("User {}", i)),
                phone: None,
                id,
            })
            .await?;
    }
    log::info!("Upserted {} user nodes", args.users);

    let mut created = 0;
    for i in 1..=args.users {
        for j in (i + 1)..=(i + FAN_OUT).min(args.users) {
            created += graph
                .add_connection(&format!("user{}", i), &format!("user{}", j))
                .await?
                .affected;
        }
    }
    log::info!("Created {} new CONNECTED_TO edges", created);

    if args.posts > 0 {
        let (users, per_user) = (args.users, args.posts);
        let inserted = store_db
            .with_connection(move |conn| {
                let tx = conn.transaction()?;
                let now = Utc::now();
                let mut n = 0;
                {
                    let mut stmt = tx.prepare(
                        "INSERT INTO posts (id, user_id, content, connection_type, created_at)
                         VALUES (?1, ?2, ?3, ?4, ?5)",
                    )?;
                    for i in 1..=users {
                        for k in 0..per_user {
                            let created_at = (now - Duration::minutes((i * per_user + k) as i64))
                                .to_rfc3339_opts(SecondsFormat::Millis, true);
                            let ceiling = (k % 3 + 1).to_string();
                            stmt.execute(params![
                                Uuid::new_v4().to_string(),
                                format!("user{}", i),
                                format!("Sample post {} from user{}", k + 1, i),
                                ceiling,
                                created_at
                            ])?;
                            n += 1;
                        }
                    }
                }
                tx.commit()?;
                Ok(n)
            })
            .await?;
        log::info!("Inserted {} sample posts", inserted);
    }

    println!("Seeded {} users ({} new edges)", args.users, created);
    Ok(())
}
