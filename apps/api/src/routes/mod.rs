pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::export::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api/v1/exports", post(handlers::handle_build))
        .route("/api/v1/exports/:id", get(handlers::handle_get_export))
        .route("/api/v1/exports/:id/render", post(handlers::handle_render))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::*;
    use crate::export::handlers::PAGE_COUNT_HEADER;
    use crate::export::memory::{user_id, Harness};

    fn router(h: &Harness) -> Router {
        build_router(AppState {
            exports: h.service.clone(),
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn read_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let h = Harness::new();
        let response = router(&h)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(read_json(response).await["service"], "keepsake-api");
    }

    #[tokio::test]
    async fn test_build_then_render_over_http() {
        let h = Harness::new();
        let app = router(&h);

        let response = app
            .clone()
            .oneshot(post_json("/api/v1/exports", json!({ "user_id": user_id() })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let built = read_json(response).await;
        assert_eq!(built["status"], "rendering");
        assert!(built.get("url").is_none());
        let export_id = built["export_id"].as_str().unwrap().to_string();

        let response = app
            .clone()
            .oneshot(
                Request::post(format!("/api/v1/exports/{export_id}/render"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let rendered = read_json(response).await;
        assert_eq!(rendered["export_id"], export_id.as_str());
        assert!(rendered["document_url"].as_str().unwrap().starts_with("memory://"));

        let response = app
            .oneshot(post_json("/api/v1/exports", json!({ "user_id": user_id() })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cached = read_json(response).await;
        assert_eq!(cached["export_id"], export_id.as_str());
        assert_eq!(cached["url"], rendered["document_url"]);
        assert_eq!(cached["page_count"], rendered["page_count"]);
    }

    #[tokio::test]
    async fn test_wait_renders_in_request() {
        let h = Harness::new();
        let response = router(&h)
            .oneshot(post_json(
                "/api/v1/exports",
                json!({ "user_id": user_id(), "theme": "minimal", "wait": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = read_json(response).await;
        assert_eq!(body["status"], "ready");
        assert!(body["page_count"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn test_preview_returns_pdf_inline() {
        let h = Harness::new();
        let app = router(&h);
        let built = read_json(
            app.clone()
                .oneshot(post_json("/api/v1/exports", json!({ "user_id": user_id() })))
                .await
                .unwrap(),
        )
        .await;
        let export_id = built["export_id"].as_str().unwrap();

        let response = app
            .oneshot(post_json(
                &format!("/api/v1/exports/{export_id}/render"),
                json!({ "preview_only": true }),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], "application/pdf");
        let pages: u32 = response.headers()[PAGE_COUNT_HEADER].to_str().unwrap().parse().unwrap();
        assert!(pages <= 3);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert!(bytes.starts_with(b"%PDF"));
    }

    #[tokio::test]
    async fn test_errors_carry_code_and_retryable_flag() {
        let h = Harness::with_entries(Vec::new());
        let response = router(&h)
            .oneshot(post_json("/api/v1/exports", json!({ "user_id": user_id() })))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = read_json(response).await;
        assert_eq!(body["error"]["code"], "NO_CONTENT");
        assert_eq!(body["error"]["retryable"], false);
    }

    #[tokio::test]
    async fn test_unknown_export_is_404() {
        let h = Harness::new();
        let response = router(&h)
            .oneshot(
                Request::get(format!("/api/v1/exports/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
