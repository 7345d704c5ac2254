//! HTTP control surface

pub mod config;
pub mod listener;
pub mod routes;

pub use config::ServerConfig;
pub use listener::RelayServer;
pub use routes::router;
