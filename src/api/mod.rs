//! HTTP surface under `/api/users`.
//!
//! Every handler returns an [`Envelope`](crate::envelope::Envelope): 200 on
//! success, 500 on failure.

mod handlers;
pub mod params;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::cache::DegreeCache;
use crate::config::EngineConfig;
use crate::db::Db;
use crate::error::{Result, SixgraphError};
use crate::feed::{FeedEngine, FeedSettings};
use crate::graph::GraphStore;
use crate::requests::ConnectionRequests;

/// Services shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub graph: GraphStore,
    pub cache: DegreeCache,
    pub feed: FeedEngine,
    pub requests: ConnectionRequests,
    pub default_page_limit: usize,
    pub max_page_limit: usize,
}

impl AppState {
    pub fn new(graph: GraphStore, store: Db, engine: &EngineConfig) -> Self {
        let cache = DegreeCache::new(graph.clone(), store.clone(), engine.mirror_enabled);
        let feed = FeedEngine::new(graph.clone(), cache.clone(), store.clone(), FeedSettings::from(engine));
        let requests = ConnectionRequests::new(graph.clone(), store);
        Self {
            graph,
            cache,
            feed,
            requests,
            default_page_limit: engine.default_page_limit,
            max_page_limit: engine.max_page_limit,
        }
    }
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    if allowed_origins.is_empty() {
        CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> =
            allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

pub fn router(state: AppState, allowed_origins: &[String]) -> Router {
    let users = Router::new()
        .route("/create-node", post(handlers::create_node))
        .route("/connect", post(handlers::connect))
        .route("/connect-mutual", post(handlers::connect_mutual))
        .route("/remove-connection", post(handlers::remove_connection))
        .route("/remove-mutual-connection", post(handlers::remove_mutual_connection))
        .route("/connection-details", post(handlers::connection_details))
        .route("/connections/:id", get(handlers::connections))
        .route("/mutuals/:user_id1/:user_id2", get(handlers::mutuals))
        .route("/posts/:user_id", get(handlers::posts))
        .route("/posts/:user_id/count", get(handlers::post_count))
        .route("/connection-requests/:user_id", get(handlers::connection_requests))
        .route("/cache-connections/:user_id", post(handlers::cache_connections))
        .route("/cached-connections/:user_id", get(handlers::cached_connections));

    Router::new()
        .nest("/api/users", users)
        .route("/health", get(handlers::health))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors_layer(allowed_origins)),
        )
        .with_state(state)
}

/// Bind `127.0.0.1:port` and serve until the process exits.
pub async fn serve(state: AppState, port: u16, allowed_origins: &[String]) -> Result<()> {
    let app = router(state, allowed_origins);
    let addr = format!("127.0.0.1:{}", port);

    let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
        SixgraphError::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to bind to {}: {}", addr, e),
        ))
    })?;
    log::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await.map_err(|e| {
        SixgraphError::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            format!("HTTP server error: {}", e),
        ))
    })?;
    Ok(())
}
