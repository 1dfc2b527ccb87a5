//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files, and
//! the defaults reproduce the stock endpoint table.

use axum::http::StatusCode;
use axum::routing::MethodFilter;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::exchange::{Deadline, TimeoutAction, TimeoutKind};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address, connection limit).
    pub listener: ListenerConfig,

    /// Connection-level timeouts.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Endpoint table.
    pub endpoints: Vec<EndpointConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            endpoints: default_endpoints(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8180").
    pub bind_address: String,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8180".to_string(),
            max_connections: 10_000,
        }
    }
}

/// Connection-level timeouts. Per-exchange deadlines live on each endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Time allowed for a request head to arrive on an open connection.
    pub header_read_secs: u64,

    /// Time allowed for open connections to finish after shutdown starts.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            header_read_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when RUST_LOG is unset.
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9180".to_string(),
        }
    }
}

/// HTTP method an endpoint answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn filter(self) -> MethodFilter {
        match self {
            HttpMethod::Get => MethodFilter::GET,
            HttpMethod::Post => MethodFilter::POST,
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpMethod::Get => f.write_str("GET"),
            HttpMethod::Post => f.write_str("POST"),
        }
    }
}

/// How a handler produces its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Shape {
    /// Respond at once, without waiting for the body.
    Immediate,
    /// Respond after `delay_ms` without reading the body. A request that still
    /// carries a body makes this the fire-and-forget shape.
    Delayed,
    /// Drain the body to end-of-stream, then respond after `delay_ms`.
    StreamingRead,
}

/// What to do once a deadline fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    #[default]
    Log,
    Respond,
    Abort,
}

/// A deadline as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct DeadlineConfig {
    pub after_ms: u64,

    #[serde(default)]
    pub action: ActionKind,

    /// Status for `respond`; defaults to 408 for reads and 503 for writes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
}

impl DeadlineConfig {
    pub fn log(after_ms: u64) -> Self {
        Self {
            after_ms,
            action: ActionKind::Log,
            status: None,
        }
    }

    pub fn respond(after_ms: u64, status: u16) -> Self {
        Self {
            after_ms,
            action: ActionKind::Respond,
            status: Some(status),
        }
    }

    pub fn abort(after_ms: u64) -> Self {
        Self {
            after_ms,
            action: ActionKind::Abort,
            status: None,
        }
    }

    /// Resolve into a runtime deadline for the given direction.
    pub fn to_deadline(&self, kind: TimeoutKind) -> Deadline {
        let action = match self.action {
            ActionKind::Log => TimeoutAction::LogOnly,
            ActionKind::Respond => TimeoutAction::Respond(
                self.status
                    .and_then(|code| StatusCode::from_u16(code).ok())
                    .unwrap_or_else(|| kind.default_status()),
            ),
            ActionKind::Abort => TimeoutAction::Abort,
        };
        Deadline::new(Duration::from_millis(self.after_ms), action)
    }
}

/// One endpoint of the HTTP surface.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EndpointConfig {
    pub method: HttpMethod,

    pub path: String,

    pub shape: Shape,

    /// Delay before the response is produced, for delayed shapes.
    #[serde(default)]
    pub delay_ms: u64,

    #[serde(default = "default_status")]
    pub status: u16,

    #[serde(default)]
    pub body: String,

    #[serde(default)]
    pub read_deadline: Option<DeadlineConfig>,

    #[serde(default)]
    pub write_deadline: Option<DeadlineConfig>,
}

fn default_status() -> u16 {
    200
}

impl EndpointConfig {
    pub fn new(method: HttpMethod, path: &str, shape: Shape) -> Self {
        Self {
            method,
            path: path.to_string(),
            shape,
            delay_ms: 0,
            status: default_status(),
            body: String::new(),
            read_deadline: None,
            write_deadline: None,
        }
    }

    pub fn delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }

    pub fn reply(mut self, status: u16, body: &str) -> Self {
        self.status = status;
        self.body = body.to_string();
        self
    }

    pub fn read_deadline(mut self, deadline: DeadlineConfig) -> Self {
        self.read_deadline = Some(deadline);
        self
    }

    pub fn write_deadline(mut self, deadline: DeadlineConfig) -> Self {
        self.write_deadline = Some(deadline);
        self
    }

    pub fn delay_duration(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    pub fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK)
    }

    pub fn read(&self) -> Option<Deadline> {
        self.read_deadline
            .as_ref()
            .map(|d| d.to_deadline(TimeoutKind::Read))
    }

    pub fn write(&self) -> Option<Deadline> {
        self.write_deadline
            .as_ref()
            .map(|d| d.to_deadline(TimeoutKind::Write))
    }
}

/// The stock endpoint table.
pub fn default_endpoints() -> Vec<EndpointConfig> {
    use HttpMethod::{Get, Post};

    vec![
        EndpointConfig::new(Get, "/", Shape::Immediate).reply(200, "Hello World!"),
        EndpointConfig::new(Get, "/two", Shape::Delayed)
            .delay(2_000)
            .reply(200, "Took 2 seconds to load")
            .read_deadline(DeadlineConfig::log(500))
            .write_deadline(DeadlineConfig::log(500)),
        EndpointConfig::new(Get, "/three", Shape::Delayed)
            .delay(3_000)
            .reply(200, "Took 3 seconds to load")
            .write_deadline(DeadlineConfig::respond(1_000, 503)),
        EndpointConfig::new(Get, "/five", Shape::Delayed)
            .delay(5_000)
            .reply(200, "Took 5 seconds to load")
            .write_deadline(DeadlineConfig::abort(1_000)),
        EndpointConfig::new(Get, "/ten", Shape::Delayed)
            .delay(10_000)
            .reply(200, "Took 10 seconds to load"),
        EndpointConfig::new(Post, "/data1", Shape::Delayed)
            .delay(2_000)
            .reply(201, "Took 2 seconds to send our response.")
            .read_deadline(DeadlineConfig::log(500))
            .write_deadline(DeadlineConfig::log(500)),
        EndpointConfig::new(Post, "/data2", Shape::Immediate)
            .reply(200, "Sent our response immediately.")
            .read_deadline(DeadlineConfig::log(500))
            .write_deadline(DeadlineConfig::log(500)),
        EndpointConfig::new(Post, "/data3", Shape::StreamingRead)
            .reply(201, "Received the file!")
            .read_deadline(DeadlineConfig::log(500))
            .write_deadline(DeadlineConfig::log(500)),
        EndpointConfig::new(Post, "/data4", Shape::StreamingRead)
            .delay(2_000)
            .reply(201, "Received the file!")
            .read_deadline(DeadlineConfig::log(1))
            .write_deadline(DeadlineConfig::log(500)),
    ]
}
