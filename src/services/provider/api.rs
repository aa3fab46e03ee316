use std::sync::Arc;

use axum::{Json, Router, extract::State, routing::get};

use super::service::ServiceProvider;
use crate::services::client::RegistrySource;
use crate::services::registry::Registration;

/// `GET /providers`：读取最新快照（顺带推送变化）并返回
pub fn create_router<S: RegistrySource>(provider: Arc<ServiceProvider<S>>) -> Router {
    Router::new()
        .route("/providers", get(providers_handler::<S>))
        .with_state(provider)
}

async fn providers_handler<S: RegistrySource>(
    State(provider): State<Arc<ServiceProvider<S>>>,
) -> Json<Vec<Registration>> {
    Json(provider.get_services().await)
}
