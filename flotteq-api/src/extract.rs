/// Request extractors that reject with [`ApiError`]
///
/// axum's own `Json`, `Path` and `Query` answer malformed input with a plain
/// text body. These wrappers run the same extraction and turn the rejection
/// into the usual `{error, message}` JSON.

use crate::error::ApiError;
use axum::extract::{FromRequest, FromRequestParts};

/// JSON request body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

/// Path parameters
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(ApiError))]
pub struct ApiPath<T>(pub T);

/// Query string
#[derive(Debug, FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(ApiError))]
pub struct ApiQuery<T>(pub T);

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{header, Request, StatusCode},
        routing::{get, post},
        Router,
    };
    use serde::Deserialize;
    use tower::ServiceExt;
    use uuid::Uuid;

    #[derive(Deserialize)]
    struct Plate {
        plate: String,
    }

    #[derive(Deserialize)]
    struct Page {
        #[allow(dead_code)]
        page: u32,
    }

    fn router() -> Router {
        Router::new()
            .route("/plates", post(|ApiJson(body): ApiJson<Plate>| async move { body.plate }))
            .route("/vehicles/:id", get(|ApiPath(id): ApiPath<Uuid>| async move { id.to_string() }))
            .route("/list", get(|ApiQuery(_): ApiQuery<Page>| async { "ok" }))
    }

    async fn send(request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = router().oneshot(request).await.unwrap();
        let status = response.status();
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null))
    }

    fn json_post(body: &'static str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/plates")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body))
            .unwrap()
    }

    #[tokio::test]
    async fn test_valid_json_reaches_handler() {
        let response = router().oneshot(json_post(r#"{"plate":"AB-123-CD"}"#)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_truncated_json_is_bad_request() {
        let (status, body) = send(json_post("{")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
        assert!(body["message"].is_string());
    }

    #[tokio::test]
    async fn test_wrong_shape_is_validation_error() {
        let (status, body) = send(json_post(r#"{"plate":42}"#)).await;

        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["error"], "validation_error");
        assert_eq!(body["details"][0]["field"], "body");
    }

    #[tokio::test]
    async fn test_missing_content_type() {
        let request = Request::builder()
            .method("POST")
            .uri("/plates")
            .body(Body::from(r#"{"plate":"AB-123-CD"}"#))
            .unwrap();
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"], "unsupported_media_type");
    }

    #[tokio::test]
    async fn test_bad_uuid_in_path() {
        let request = Request::builder().uri("/vehicles/not-a-uuid").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }

    #[tokio::test]
    async fn test_bad_query_string() {
        let request = Request::builder().uri("/list?page=first").body(Body::empty()).unwrap();
        let (status, body) = send(request).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "bad_request");
    }
}
