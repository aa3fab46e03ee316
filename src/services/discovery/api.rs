use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};

use super::instances::{Discovery, InstanceMap};
use crate::services::client::RegistrySource;
use crate::services::registry::ApiError;

/// `GET /discovery`：刷新后返回 服务名 -> 实例列表
pub fn create_router<S: RegistrySource>(discovery: Arc<Discovery<S>>) -> Router {
    Router::new()
        .route("/discovery", get(discovery_handler::<S>))
        .with_state(discovery)
}

async fn discovery_handler<S: RegistrySource>(
    State(discovery): State<Arc<Discovery<S>>>,
) -> Result<Json<InstanceMap>, ApiError> {
    discovery
        .refresh()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Json(discovery.all_instances().await))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::client::ClientError;
    use crate::services::discovery::DiscoveryCache;
    use crate::services::health::HealthProber;
    use crate::services::registry::Registration;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    struct Unreachable;

    #[async_trait]
    impl RegistrySource for Unreachable {
        async fn list_services(&self) -> Result<Vec<Registration>, ClientError> {
            Err(ClientError::Decode("registry down".into()))
        }

        async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError> {
            Err(ClientError::NotFound(service_name.to_string()))
        }
    }

    struct Empty;

    #[async_trait]
    impl RegistrySource for Empty {
        async fn list_services(&self) -> Result<Vec<Registration>, ClientError> {
            Ok(Vec::new())
        }

        async fn find_services(&self, service_name: &str) -> Result<Vec<Registration>, ClientError> {
            Err(ClientError::NotFound(service_name.to_string()))
        }
    }

    fn app<S: RegistrySource>(source: S) -> Router {
        let cache = Arc::new(DiscoveryCache::new(source, Duration::from_secs(30)));
        create_router(Arc::new(Discovery::new(cache, HealthProber::default())))
    }

    #[tokio::test]
    async fn test_discovery_returns_json_map() {
        let request = Request::builder().uri("/discovery").body(Body::empty()).unwrap();
        let response = app(Empty).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"{}");
    }

    #[tokio::test]
    async fn test_discovery_refresh_failure_is_500() {
        let request = Request::builder().uri("/discovery").body(Body::empty()).unwrap();
        let response = app(Unreachable).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_discovery_rejects_other_methods() {
        let request = Request::builder()
            .method("POST")
            .uri("/discovery")
            .body(Body::empty())
            .unwrap();
        let response = app(Empty).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    }
}
