//! Builds the full Axum [`Router`], wiring REST, MCP, CORS, rate limiting,
//! and request tracing over [`AppState`].

use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::rate_limit::{PerIpRateLimiter, RateLimitConfig, RateLimitExt};
use crate::routes::{chat, documents, health, kb, mcp};
use crate::state::AppState;

#[must_use]
pub fn build_router(state: AppState, allowed_origins: &[String], rate_limit_per_minute: u32) -> Router {
    let cors = cors_layer(allowed_origins);
    let limiter = Arc::new(PerIpRateLimiter::new(RateLimitConfig::per_minute(rate_limit_per_minute)));

    let search_routes = Router::new()
        .route("/api/kb/:name/chat", post(chat::chat))
        .route("/mcp", post(mcp::mcp_global))
        .route("/mcp/kb/:slug", post(mcp::mcp_for_kb))
        .with_rate_limit(limiter);

    let rest_routes = Router::new()
        .route("/api/kb", get(kb::list_kbs).post(kb::create_kb))
        .route("/api/kb/:name", delete(kb::delete_kb))
        .route("/api/kb/:name/stats", get(kb::kb_stats))
        .route("/api/kb/:name/documents", get(kb::list_documents))
        .route("/api/kb/:name/upload", post(documents::upload_document))
        .route("/api/kb/:name/documents/:filename", delete(documents::delete_document));

    Router::new()
        .route("/health", get(health::health))
        .merge(rest_routes)
        .merge(search_routes)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// A wildcard origin is rejected by [`kbforge_config::validate_config`]
/// before the server ever starts, so every configured list here is a
/// concrete set of origins to echo back.
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origins: Vec<HeaderValue> = allowed_origins.iter().filter_map(|o| HeaderValue::from_str(o).ok()).collect();
    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods(tower_http::cors::Any)
        .allow_headers(tower_http::cors::Any)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{Method, Request, StatusCode};
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use tower::ServiceExt;

    async fn test_router() -> Router {
        let harness = crate::state::test_support::build().await;
        build_router(harness.state, &["http://localhost:3000".to_string()], 20)
    }

    /// `with_rate_limit` reads `ConnectInfo<SocketAddr>` from request
    /// extensions, which only `into_make_service_with_connect_info` populates
    /// outside of a real accepted connection — tests insert it by hand.
    fn request_with_peer(method: Method, uri: &str, body: Body) -> Request<Body> {
        let mut req = Request::builder().method(method).uri(uri).header("content-type", "application/json").body(body).unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 4000))));
        req
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let app = test_router().await;
        let response = app.oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn creating_and_listing_a_kb_round_trips() {
        let app = test_router().await;
        let create = Request::builder()
            .method(Method::POST)
            .uri("/api/kb")
            .header("content-type", "application/json")
            .body(Body::from(json!({"name": "Docs"}).to_string()))
            .unwrap();
        let response = app.clone().oneshot(create).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let created = body_json(response).await;
        assert_eq!(created["slug"], "docs");

        let list = app.oneshot(Request::builder().uri("/api/kb").body(Body::empty()).unwrap()).await.unwrap();
        let kbs = body_json(list).await;
        assert_eq!(kbs.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn deleting_a_kb_by_name_invalidates_by_slug() {
        let app = test_router().await;
        let create = Request::builder()
            .method(Method::POST)
            .uri("/api/kb")
            .header("content-type", "application/json")
            .body(Body::from(json!({"name": "Support Docs"}).to_string()))
            .unwrap();
        app.clone().oneshot(create).await.unwrap();

        let delete = Request::builder().method(Method::DELETE).uri("/api/kb/Support%20Docs").body(Body::empty()).unwrap();
        let response = app.clone().oneshot(delete).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);

        let list = app.oneshot(Request::builder().uri("/api/kb").body(Body::empty()).unwrap()).await.unwrap();
        let kbs = body_json(list).await;
        assert!(kbs.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn chat_against_an_empty_kb_reports_no_information() {
        let app = test_router().await;
        let create = Request::builder()
            .method(Method::POST)
            .uri("/api/kb")
            .header("content-type", "application/json")
            .body(Body::from(json!({"name": "Docs"}).to_string()))
            .unwrap();
        app.clone().oneshot(create).await.unwrap();

        let chat_req = request_with_peer(Method::POST, "/api/kb/Docs/chat", Body::from(json!({"query": "hello"}).to_string()));
        let response = app.oneshot(chat_req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result = body_json(response).await;
        assert!(result["answer"].as_str().unwrap().contains("don't have specific documentation"));
    }

    #[tokio::test]
    async fn mcp_global_tools_list_advertises_create_knowledge_base() {
        let app = test_router().await;
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
        let req = request_with_peer(Method::POST, "/mcp", Body::from(body));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let result = body_json(response).await;
        let tools = result["result"]["tools"].as_array().unwrap();
        assert!(tools.iter().any(|t| t["name"] == "create_knowledge_base"));
    }

    #[tokio::test]
    async fn mcp_for_kb_unknown_slug_is_http_404() {
        let app = test_router().await;
        let body = json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}).to_string();
        let req = request_with_peer(Method::POST, "/mcp/kb/ghost", Body::from(body));
        let response = app.oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
