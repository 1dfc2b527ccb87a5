//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → endpoint table drives the router and each exchange's deadlines
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults; an empty file reproduces the stock endpoints
//! - Every deadline names its action; there is no implicit timeout behavior

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    default_endpoints, ActionKind, DeadlineConfig, EndpointConfig, HttpMethod, ListenerConfig,
    LogFormat, ObservabilityConfig, ServerConfig, Shape, TimeoutConfig,
};
pub use validation::{validate_config, ValidationError};
