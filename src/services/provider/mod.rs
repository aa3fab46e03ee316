//! Service provider module
//!
//! Diffs successive registry snapshots and fans add/remove events out to
//! per-service subscribers over bounded channels.

pub mod api;
pub mod service;
pub mod types;

pub use service::ServiceProvider;
pub use types::{
    DEFAULT_CHANNEL_CAPACITY, ProviderConfig, ProviderError, ProviderStats, ServiceEvent,
    Subscription,
};
