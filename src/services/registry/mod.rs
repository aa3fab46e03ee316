//! Registry module
//!
//! The authoritative registration table and its HTTP front end:
//! - `types`: registration record and error types
//! - `store`: in-memory table keyed by service name
//! - `api`: axum router mapping verbs and paths onto the store

pub mod api;
pub mod store;
pub mod types;

pub use api::{ApiError, ErrorResponse, create_router};
pub use store::RegistryStore;
pub use types::*;
