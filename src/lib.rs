pub mod config;
pub mod host;
pub mod server;
pub mod services;
