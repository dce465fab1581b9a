use anyhow::Result;
use clap::{Parser, Subcommand};
use sixgraph::api::{self, AppState};
use sixgraph::db::{migrate, open_stores, Db};
use sixgraph::graph::GraphStore;
use sixgraph::{Config, SixgraphError};
use std::path::Path;

#[derive(Parser, Debug)]
#[command(name = "sixgraph")]
#[command(about = "Degree-of-separation graph engine and feed server")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the HTTP API
    Serve {
        /// Override http_server.port
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Apply migrations and check both store schemas (default)
    Verify,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("RUST_LOG", config.sixgraph.log_level.as_str()),
    )
    .init();

    let args = Args::parse();
    match args.command.unwrap_or(Command::Verify) {
        Command::Serve { port } => run_http_server(config, port).await?,
        Command::Verify => run_schema_verification(config).await?,
    }

    Ok(())
}

async fn run_http_server(config: Config, port: Option<u16>) -> Result<()> {
    log::info!("Starting Sixgraph HTTP server v{}", env!("CARGO_PKG_VERSION"));

    let (graph_db, store_db) = open_stores(&config, Path::new("migrations")).await?;
    let state = AppState::new(GraphStore::new(graph_db), store_db, &config.engine);
    log::info!(
        "Feed eligibility: {:?}, page limit {} (max {})",
        config.engine.eligibility,
        config.engine.default_page_limit,
        config.engine.max_page_limit
    );

    let port = port.unwrap_or(config.http_server.port);
    api::serve(state, port, &config.http_server.allowed_origins).await?;
    Ok(())
}

async fn run_schema_verification(config: Config) -> Result<()> {
    log::info!("Starting Sixgraph v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Graph store: {}", config.graph_db_path().display());
    log::info!("Content store: {}", config.store_db_path().display());

    let (graph_db, store_db) = open_stores(&config, Path::new("migrations")).await?;

    verify_tables(&graph_db, &["connected_to", "has_degree", "schema_migrations", "user_nodes"]).await?;
    verify_tables(&store_db, &["post_reactions", "posts", "schema_migrations", "user_connections"]).await?;

    log::info!("✓ Schema verification complete");
    Ok(())
}

/// Check that every expected table exists and the session pragmas took effect
async fn verify_tables(db: &Db, expected: &'static [&'static str]) -> Result<()> {
    let path = db.path().display().to_string();
    db.with_connection(move |conn| {
        let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")?;
        let tables: Vec<String> = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;

        let missing: Vec<&str> = expected
            .iter()
            .copied()
            .filter(|t| !tables.iter().any(|have| have == t))
            .collect();
        if !missing.is_empty() {
            return Err(SixgraphError::Config(format!("{} is missing tables: {}", path, missing.join(", "))));
        }

        let applied = migrate::get_applied_migrations(conn)?;
        log::debug!("✓ {} migrations applied to {}", applied.len(), path);

        let journal_mode: String = conn.query_row("PRAGMA journal_mode", [], |row| row.get(0))?;
        if journal_mode.to_uppercase() != "WAL" {
            return Err(SixgraphError::Config(format!("Journal mode is not WAL: {}", journal_mode)));
        }

        let integrity: String = conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        if integrity != "ok" {
            return Err(SixgraphError::Config(format!("Integrity check failed for {}: {}", path, integrity)));
        }
        log::info!("✓ {} OK", path);
        Ok(())
    })
    .await?;
    Ok(())
}
