pub mod config;
pub mod error;
pub mod registry_client;
pub mod source;

pub use config::*;
pub use error::*;
pub use registry_client::*;
pub use source::*;
