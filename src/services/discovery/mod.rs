//! Discovery module
//!
//! Client-side view of the registry:
//! - `cache`: TTL cache of the full registration list
//! - `instances`: probed instance table with round-robin selection and watchers
//! - `api`: the `/discovery` endpoint

pub mod api;
pub mod cache;
pub mod instances;

pub use cache::{DEFAULT_CACHE_TTL, DiscoveryCache};
pub use instances::{
    DEFAULT_WATCH_CAPACITY, Discovery, DiscoveryError, InstanceMap, ServiceInstance,
};
