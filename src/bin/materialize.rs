use anyhow::Result;
use clap::Parser;
use sixgraph::cache::DegreeCache;
use sixgraph::db::open_stores;
use sixgraph::graph::GraphStore;
use sixgraph::Config;
use std::path::PathBuf;
use std::time::Instant;

#[derive(Parser, Debug)]
#[command(name = "materialize")]
#[command(about = "Rebuild the HAS_DEGREE cache for one user, or for every user node")]
struct Args {
    /// User to rebuild; omit to rebuild everyone
    #[arg(short, long)]
    user: Option<String>,

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
    let cache = DegreeCache::new(graph.clone(), store_db, config.engine.mirror_enabled);

    let users = match args.user {
        Some(user) => vec![user],
        None => graph.list_user_ids().await?,
    };

    let started = Instant::now();
    let mut edges = 0;
    let mut mirror_failures = 0;
    for user in &users {
        let report = cache.materialize(user).await?;
        edges += report.cached;
        if report.mirror_error.is_some() {
            mirror_failures += 1;
        }
    }

    println!(
        "Materialized {} users ({} cache edges) in {:.2}s",
        users.len(),
        edges,
        started.elapsed().as_secs_f64()
    );
    if mirror_failures > 0 {
        println!("Mirror refresh failed for {} users; reads fall back to the graph cache", mirror_failures);
    }
    Ok(())
}
