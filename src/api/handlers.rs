use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::api::params::{required, CacheParams, CreateNodeBody, FeedParams, PairBody};
use crate::api::AppState;
use crate::envelope::Envelope;
use crate::error::Result;
use crate::graph::UserNode;

fn respond<T: Serialize>(operation: &str, message: Option<&str>, result: Result<T>) -> Response {
    let mut envelope = Envelope::capture(operation, result);
    if let (true, Some(message)) = (envelope.success, message) {
        envelope = envelope.with_message(message);
    }
    let status = if envelope.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(envelope)).into_response()
}

pub async fn health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "sixgraph",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

pub async fn create_node(State(state): State<AppState>, Json(body): Json<CreateNodeBody>) -> Response {
    let result = match required("userId", &body.user_id) {
        Ok(id) => {
            let node = UserNode {
                id: id.to_string(),
                name: body.name.clone(),
                phone: body.phone.clone(),
            };
            state.graph.upsert_user(node).await
        }
        Err(e) => Err(e),
    };
    respond("create_user_node", Some("User node created"), result)
}

pub async fn connect(State(state): State<AppState>, Json(body): Json<PairBody>) -> Response {
    let result = match body.ids() {
        Ok((a, b)) => state.graph.add_connection(a, b).await,
        Err(e) => Err(e),
    };
    respond("add_connection", Some("Connection created"), result)
}

pub async fn connect_mutual(State(state): State<AppState>, Json(body): Json<PairBody>) -> Response {
    let result = match body.ids() {
        Ok((a, b)) => state.graph.create_bidirectional_connection(a, b).await,
        Err(e) => Err(e),
    };
    respond("create_bidirectional_connection", Some("Mutual connection created"), result)
}

pub async fn remove_connection(State(state): State<AppState>, Json(body): Json<PairBody>) -> Response {
    let result = match body.ids() {
        Ok((a, b)) => state.graph.disconnect_one_way(a, b).await,
        Err(e) => Err(e),
    };
    respond("disconnect_one_way", Some("Connection removed"), result)
}

pub async fn remove_mutual_connection(State(state): State<AppState>, Json(body): Json<PairBody>) -> Response {
    let result = match body.ids() {
        Ok((a, b)) => state.graph.disconnect_mutual(a, b).await,
        Err(e) => Err(e),
    };
    respond("disconnect_mutual", Some("Mutual connection removed"), result)
}

pub async fn connection_details(State(state): State<AppState>, Json(body): Json<PairBody>) -> Response {
    let result = match body.ids() {
        Ok((a, b)) => state.graph.connection_details(a, b).await,
        Err(e) => Err(e),
    };
    respond("connection_details", None, result)
}

pub async fn connections(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let result = state.graph.get_connections(&user_id).await;
    respond("get_connections", Some("Connections fetched"), result)
}

pub async fn mutuals(State(state): State<AppState>, Path((a, b)): Path<(String, String)>) -> Response {
    let result = state.graph.get_mutual_connections(&a, &b).await;
    respond("get_mutual_connections", Some("Mutual connections fetched"), result)
}

pub async fn posts(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Response {
    let request = params.into_request(user_id, state.default_page_limit, state.max_page_limit);
    let result = state.feed.get_feed(&request).await;
    respond("get_feed", Some("Posts fetched"), result)
}

pub async fn post_count(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<FeedParams>,
) -> Response {
    let result = state.feed.count_eligible_posts(&user_id, params.degree()).await;
    respond("count_eligible_posts", None, result)
}

pub async fn connection_requests(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let result = state.requests.list(&user_id).await;
    respond("list_connection_requests", Some("Connection requests fetched"), result)
}

pub async fn cache_connections(State(state): State<AppState>, Path(user_id): Path<String>) -> Response {
    let result = state.cache.materialize(&user_id).await;
    respond("materialize_degree_cache", Some("Connections cached"), result)
}

pub async fn cached_connections(
    State(state): State<AppState>,
    Path(user_id): Path<String>,
    Query(params): Query<CacheParams>,
) -> Response {
    let opts = params.into_options(state.max_page_limit);
    let result = state.cache.read_cache(&user_id, opts).await;
    respond("read_cache", None, result)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Method, Request, StatusCode};
    use axum::Router;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::api::{router, AppState};
    use crate::config::EngineConfig;
    use crate::test_support::{insert_post, insert_reaction, post, scenario_fixture, Fixture};

    async fn app() -> (Router, Fixture) {
        let fx = scenario_fixture().await;
        let state = AppState::new(fx.graph.clone(), fx.store.clone(), &EngineConfig::default());
        (router(state, &[]), fx)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _fx) = app().await;
        let (status, body) = send(&app, Method::GET, "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_connections_route() {
        let (app, _fx) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/users/connections/alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(
            body["data"],
            json!([
                {"connectionId": "bob", "degree": 1},
                {"connectionId": "carol", "degree": 2}
            ])
        );
    }

    #[tokio::test]
    async fn test_unknown_user_has_empty_connections() {
        let (app, _fx) = app().await;
        let (status, body) = send(&app, Method::GET, "/api/users/connections/nobody", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"], json!([]));
    }

    #[tokio::test]
    async fn test_create_node_and_connect() {
        let (app, fx) = app().await;
        let (status, body) = send(
            &app,
            Method::POST,
            "/api/users/create-node",
            Some(json!({"userId": "dave", "name": "Dave"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "User node created");

        let (status, body) = send(
            &app,
            Method::POST,
            "/api/users/connect-mutual",
            Some(json!({"userId1": "carol", "userId2": "dave"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["affected"], 2);
        assert_eq!(fx.graph.get_connection_degree("alice", "dave").await.unwrap(), Some(3));

        let (_, body) = send(
            &app,
            Method::POST,
            "/api/users/remove-connection",
            Some(json!({"userId1": "carol", "userId2": "dave"})),
        )
        .await;
        assert_eq!(body["data"]["affected"], 1);
        assert_eq!(fx.graph.get_chat_peers("dave").await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn test_missing_user_id_is_failure_envelope() {
        let (app, _fx) = app().await;
        let (status, body) = send(&app, Method::POST, "/api/users/connect", Some(json!({"userId1": "alice"}))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["success"], false);
        assert_eq!(body["data"], Value::Null);
        assert!(body["error"].as_str().unwrap().contains("userId2"));
    }

    #[tokio::test]
    async fn test_connection_details_route() {
        let (app, _fx) = app().await;
        let (_, body) = send(
            &app,
            Method::POST,
            "/api/users/connection-details",
            Some(json!({"userId1": "alice", "userId2": "carol"})),
        )
        .await;
        assert_eq!(body["data"], json!({"mutualCount": 0, "connectionDegree": 2}));
    }

    #[tokio::test]
    async fn test_posts_route_with_bad_numbers() {
        let (app, fx) = app().await;
        insert_post(&fx.store, post("a1", "alice", "2026-04-02T00:00:00Z")).await;
        insert_post(&fx.store, post("b1", "bob", "2026-04-01T00:00:00Z")).await;

        let (status, body) = send(
            &app,
            Method::GET,
            "/api/users/posts/alice?degreeFilter=abc&page=NaN&limit=1",
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let data = &body["data"];
        assert_eq!(data["posts"].as_array().unwrap().len(), 1);
        assert_eq!(data["posts"][0]["id"], "a1");
        assert_eq!(data["posts"][0]["connectionType"], "0");
        assert_eq!(data["pagination"]["currentPage"], 1);
        assert_eq!(data["pagination"]["hasMore"], true);
        assert_eq!(data["pagination"]["nextPage"], 2);

        let (_, body) = send(&app, Method::GET, "/api/users/posts/alice/count", None).await;
        assert_eq!(body["data"], 2);
    }

    #[tokio::test]
    async fn test_posts_route_with_huge_page() {
        let (app, fx) = app().await;
        insert_post(&fx.store, post("a1", "alice", "2026-04-02T00:00:00Z")).await;

        let (status, body) = send(&app, Method::GET, "/api/users/posts/alice?page=1e300&limit=5", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        let data = &body["data"];
        assert!(data["posts"].as_array().unwrap().is_empty());
        assert_eq!(data["pagination"]["currentPage"], json!(i64::MAX));
        assert_eq!(data["pagination"]["hasMore"], false);
        assert_eq!(data["pagination"]["isUpToDate"], false);
    }

    #[tokio::test]
    async fn test_cache_routes() {
        let (app, _fx) = app().await;
        let (status, body) = send(&app, Method::POST, "/api/users/cache-connections/alice", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["cached"], 2);

        let (_, body) = send(
            &app,
            Method::GET,
            "/api/users/cached-connections/alice?degree=2&sortBy=bogus",
            None,
        )
        .await;
        assert_eq!(body["data"]["total"], 1);
        assert_eq!(body["data"]["connections"][0]["connectionId"], "carol");
        assert_eq!(body["data"]["source"], "mirror");
    }

    #[tokio::test]
    async fn test_connection_requests_route() {
        let (app, fx) = app().await;
        insert_post(&fx.store, post("p1", "alice", "2026-04-01T00:00:00Z")).await;
        insert_reaction(&fx.store, "r1", "p1", "bob", "alice", true, false).await;

        let (_, body) = send(&app, Method::GET, "/api/users/connection-requests/alice", None).await;
        assert_eq!(body["data"][0]["reactor_id"], "bob");
        assert_eq!(body["data"][0]["degree"], 1);
        assert_eq!(body["data"][0]["mutuals"], 1);
    }
}
