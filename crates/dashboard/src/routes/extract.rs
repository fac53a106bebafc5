//! Request extractors that reject with [`AppError`].
//!
//! Drop-in replacements for axum's `Json`, `Path` and `Query` so malformed
//! bodies, IDs and query strings render the `{"success": false, ...}`
//! envelope instead of axum's plain-text rejection.

use axum::extract::{FromRequest, FromRequestParts};

use crate::error::AppError;

/// JSON request body.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct Json<T>(pub T);

/// Path parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct Path<T>(pub T);

/// Query string parameters.
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct Query<T>(pub T);

#[cfg(test)]
mod tests {
    use axum::{
        Router,
        body::{Body, to_bytes},
        http::{Request, StatusCode},
        routing::{get, post},
    };
    use serde::Deserialize;
    use tower::ServiceExt;

    use winqer_core::StoreId;

    use super::*;

    #[derive(Deserialize)]
    struct Limit {
        limit: u32,
    }

    #[derive(Deserialize)]
    struct Rename {
        name: String,
    }

    fn app() -> Router {
        Router::new()
            .route("/stores/{id}", get(|Path(id): Path<StoreId>| async move { id.to_string() }))
            .route("/items", get(|Query(q): Query<Limit>| async move { q.limit.to_string() }))
            .route("/rename", post(|Json(body): Json<Rename>| async move { body.name }))
    }

    async fn call(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = app().oneshot(request).await.expect("response");
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body");
        (status, serde_json::from_slice(&bytes).expect("json error body"))
    }

    #[tokio::test]
    async fn test_non_uuid_path_renders_envelope() {
        let request = Request::get("/stores/not-a-uuid").body(Body::empty()).expect("request");
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(body["error"].as_str().is_some_and(|e| e.starts_with("Invalid path")));
    }

    #[tokio::test]
    async fn test_bad_query_renders_envelope() {
        let request = Request::get("/items?limit=many").body(Body::empty()).expect("request");
        let (status, body) = call(request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_json_rejections_keep_their_status() {
        let malformed = Request::post("/rename")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .expect("request");
        let (status, body) = call(malformed).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);

        let wrong_type = Request::post("/rename")
            .header("content-type", "text/plain")
            .body(Body::from(r#"{"name":"x"}"#))
            .expect("request");
        let (status, body) = call(wrong_type).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["success"], false);

        let missing_field = Request::post("/rename")
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .expect("request");
        let (status, body) = call(missing_field).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["success"], false);
    }
}
