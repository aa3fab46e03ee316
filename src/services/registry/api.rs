use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use bytes::Bytes;
use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use serde_json::json;

use super::store::RegistryStore;
use super::types::{Registration, RegistryError, ServiceHealthReport};

/// 注册中心 HTTP 路由
pub fn create_router(store: Arc<RegistryStore>) -> Router {
    Router::new()
        .route(
            "/services",
            get(list_services)
                .post(register_service)
                .delete(deregister_service),
        )
        .route("/services/tag/:tag", get(find_by_tag))
        .route("/services/:name", get(find_by_name))
        .route("/health", get(registry_health))
        .route("/health/:name", get(service_health))
        .with_state(store)
}

async fn register_service(
    State(store): State<Arc<RegistryStore>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    // 手动解码，格式错误统一返回 400
    let mut registration: Registration = serde_json::from_slice(&body).map_err(|e| {
        tracing::warn!(error = %e, "Rejected malformed registration body");
        ApiError::BadRequest(format!("malformed registration: {e}"))
    })?;
    registration.normalize();
    registration.validate()?;

    registration.registered_at = Some(Utc::now());
    tracing::info!(
        service_name = %registration.service_name,
        url = %registration.service_url,
        "Adding service"
    );
    store.add(registration);

    Ok(StatusCode::OK)
}

async fn deregister_service(
    State(store): State<Arc<RegistryStore>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    let url = std::str::from_utf8(&body)
        .map_err(|_| ApiError::BadRequest("service url must be valid UTF-8".into()))?
        .trim();

    tracing::info!(url = %url, "Removing service");
    store.remove(url)?;
    Ok(StatusCode::OK)
}

async fn list_services(State(store): State<Arc<RegistryStore>>) -> Json<Vec<Registration>> {
    Json(store.list())
}

async fn find_by_name(
    State(store): State<Arc<RegistryStore>>,
    Path(name): Path<String>,
) -> Result<Json<Vec<Registration>>, ApiError> {
    let found = store.find_by_name(&name);
    if found.is_empty() {
        return Err(ApiError::NotFound("service not found".into()));
    }
    Ok(Json(found))
}

async fn find_by_tag(
    State(store): State<Arc<RegistryStore>>,
    Path(tag): Path<String>,
) -> Json<Vec<Registration>> {
    Json(store.find_by_tag(&tag))
}

async fn registry_health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "time": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
    }))
}

async fn service_health(
    State(store): State<Arc<RegistryStore>>,
    Path(name): Path<String>,
) -> Json<ServiceHealthReport> {
    let check = store.health_check(&name).await;
    Json(ServiceHealthReport {
        service_name: name,
        healthy: check.healthy,
        latency: check.latency_ms,
    })
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// HTTP 层错误，统一映射为状态码 + `{"error": ...}`
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Internal(String),
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            RegistryError::Validation(_) => ApiError::BadRequest(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, message = %message, "API error");
        } else {
            tracing::debug!(status = %status, message = %message, "API client error");
        }

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, body)
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/services")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_post_stamps_registered_at() {
        let store = Arc::new(RegistryStore::default());
        let app = create_router(store.clone());

        let body = r#"{"serviceName":"A","serviceUrl":"http://h:1","registeredAt":"2001-01-01T00:00:00Z"}"#;
        let (status, _) = send(&app, post_json(body)).await;
        assert_eq!(status, StatusCode::OK);

        let stored = store.find_by_name("A");
        let stamped = stored[0].registered_at.unwrap();
        assert!(stamped.timestamp() > 978_307_200);
    }

    #[tokio::test]
    async fn test_malformed_post_is_rejected() {
        let store = Arc::new(RegistryStore::default());
        let app = create_router(store.clone());

        let (status, _) = send(&app, post_json("{not json")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // 缺少必填字段
        let (status, _) = send(&app, post_json(r#"{"serviceUrl":"http://h:1"}"#)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_delete_unknown_url_is_not_found() {
        let store = Arc::new(RegistryStore::default());
        store.add(Registration::new("A", "http://h:1"));
        let app = create_router(store.clone());

        let request = Request::builder()
            .method("DELETE")
            .uri("/services")
            .header("content-type", "text/plain")
            .body(Body::from("http://h:9"))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_padded_url_can_be_deregistered() {
        let store = Arc::new(RegistryStore::default());
        let app = create_router(store.clone());

        let body = r#"{"serviceName":" A ","serviceUrl":"  http://h:1\n"}"#;
        let (status, _) = send(&app, post_json(body)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.list()[0].service_url, "http://h:1");
        assert_eq!(store.find_by_name("A").len(), 1);

        let request = Request::builder()
            .method("DELETE")
            .uri("/services")
            .header("content-type", "text/plain")
            .body(Body::from(" http://h:1 "))
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_find_by_name_not_found() {
        let app = create_router(Arc::new(RegistryStore::default()));
        let (status, body) = send(&app, get("/services/Missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["error"], "service not found");
    }

    #[tokio::test]
    async fn test_find_by_tag_returns_empty_array() {
        let store = Arc::new(RegistryStore::default());
        store.add(Registration::new("A", "http://h:1").with_tag("web"));
        let app = create_router(store);

        let (status, body) = send(&app, get("/services/tag/web")).await;
        assert_eq!(status, StatusCode::OK);
        let found: Vec<Registration> = serde_json::from_slice(&body).unwrap();
        assert_eq!(found.len(), 1);

        let (status, body) = send(&app, get("/services/tag/none")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(&body[..], b"[]");
    }

    #[tokio::test]
    async fn test_registry_health() {
        let app = create_router(Arc::new(RegistryStore::default()));
        let (status, body) = send(&app, get("/health")).await;
        assert_eq!(status, StatusCode::OK);

        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["status"], "ok");
        let time = value["time"].as_str().unwrap();
        assert!(chrono::DateTime::parse_from_rfc3339(time).is_ok());
    }

    #[tokio::test]
    async fn test_service_health_for_unknown_name() {
        let app = create_router(Arc::new(RegistryStore::default()));
        let (status, body) = send(&app, get("/health/Missing")).await;
        assert_eq!(status, StatusCode::OK);

        let report: ServiceHealthReport = serde_json::from_slice(&body).unwrap();
        assert_eq!(report.service_name, "Missing");
        assert!(!report.healthy);
        assert_eq!(report.latency, 0);
    }

    #[tokio::test]
    async fn test_unsupported_method_on_services() {
        let app = create_router(Arc::new(RegistryStore::default()));
        let request = Request::builder()
            .method("PUT")
            .uri("/services")
            .body(Body::empty())
            .unwrap();
        let (status, _) = send(&app, request).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    }
}
