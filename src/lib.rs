//! HTTP server with an explicit per-request timeout lifecycle.

pub mod config;
pub mod error;
pub mod exchange;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;

pub use config::schema::ServerConfig;
pub use error::{ExchangeError, ServerError};
pub use exchange::{Exchange, LifecycleController, Phase};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
