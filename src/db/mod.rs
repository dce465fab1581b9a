use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tokio::task;
use crate::config::Config;
use crate::error::{Result, SixgraphError};

pub mod migrate;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Pragmas applied to every session.
/// busy_timeout lets concurrent writers queue instead of failing with SQLITE_BUSY.
const SESSION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA temp_store = MEMORY; \
     PRAGMA cache_size = -65536; \
     PRAGMA busy_timeout = 5000;";

/// Handle to one SQLite database.
///
/// Holds no open connection. Every call opens a fresh session inside a
/// blocking task and drops it before returning, so a session can never
/// outlive the operation that opened it.
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
    timeout: Duration,
}

impl Db {
    /// Create a new database handle with the default per-call deadline
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Replace the per-call deadline
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new database connection with session pragmas applied
    pub fn open_connection(&self) -> Result<Connection> {
        open(&self.path)
    }

    /// Execute a closure with a database connection in a blocking task
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let path = self.path.clone();
        task::spawn_blocking(move || {
            let mut conn = open(&path)?;
            f(&mut conn)
        })
        .await
        .map_err(|e| SixgraphError::Task(e.to_string()))?
    }

    /// Run one named operation as a scoped session under the request deadline.
    ///
    /// Failures are logged with the operation name and returned unchanged;
    /// an expired deadline becomes [`SixgraphError::Timeout`].
    pub async fn session<F, T>(&self, operation: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let started = Instant::now();
        log::debug!("[{}] session opened on {}", operation, self.path.display());

        let outcome = match tokio::time::timeout(self.timeout, self.with_connection(f)).await {
            Ok(result) => result,
            Err(_) => Err(SixgraphError::Timeout {
                operation: operation.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        };

        match &outcome {
            Ok(_) => log::debug!("[{}] session closed after {:?}", operation, started.elapsed()),
            Err(e) => log::error!("[{}] session failed after {:?}: {}", operation, started.elapsed(), e),
        }
        outcome
    }
}

/// Open the graph and content stores named by `config` and bring both schemas
/// up to date from `migrations_root/{graph,store}`.
pub async fn open_stores(config: &Config, migrations_root: &Path) -> Result<(Db, Db)> {
    let timeout = config.engine.query_timeout();
    let graph = Db::new(config.graph_db_path()).with_timeout(timeout);
    let store = Db::new(config.store_db_path()).with_timeout(timeout);
    migrate::migrate(&graph, migrations_root, migrate::GRAPH_MIGRATIONS).await?;
    migrate::migrate(&store, migrations_root, migrate::STORE_MIGRATIONS).await?;
    log::info!(
        "Stores ready: graph={} content={}",
        graph.path().display(),
        store.path().display()
    );
    Ok((graph, store))
}

fn open(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path).map_err(SixgraphError::Database)?;
    conn.execute_batch(SESSION_PRAGMAS)?;
    Ok(conn)
}
