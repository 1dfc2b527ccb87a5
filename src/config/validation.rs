//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (deadlines > 0, statuses valid)
//! - Detect duplicate endpoints
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ServerConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;
use std::net::SocketAddr;
use thiserror::Error;

use crate::config::schema::{ActionKind, DeadlineConfig, EndpointConfig, ServerConfig};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("listener.bind_address {0:?} is not a socket address")]
    BindAddress(String),

    #[error("observability.metrics_address {0:?} is not a socket address")]
    MetricsAddress(String),

    #[error("listener.max_connections must be greater than 0")]
    NoConnections,

    #[error("endpoint path {0:?} must start with '/' and contain only literal segments")]
    Path(String),

    #[error("endpoint {0} is defined more than once")]
    Duplicate(String),

    #[error("endpoint {endpoint}: status {status} is not a valid HTTP status")]
    Status { endpoint: String, status: u16 },

    #[error("endpoint {endpoint}: {direction} deadline must be greater than 0ms")]
    ZeroDeadline {
        endpoint: String,
        direction: &'static str,
    },

    #[error("endpoint {endpoint}: {direction} deadline responds with {status}, expected a 4xx or 5xx status")]
    TimeoutStatus {
        endpoint: String,
        direction: &'static str,
        status: u16,
    },
}

/// Validate a parsed configuration, collecting every problem found.
pub fn validate_config(config: &ServerConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::BindAddress(
            config.listener.bind_address.clone(),
        ));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::NoConnections);
    }
    if config.observability.metrics_enabled
        && config
            .observability
            .metrics_address
            .parse::<SocketAddr>()
            .is_err()
    {
        errors.push(ValidationError::MetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    let mut seen = HashSet::new();
    for endpoint in &config.endpoints {
        let name = format!("{} {}", endpoint.method, endpoint.path);
        if !seen.insert((endpoint.method, endpoint.path.as_str())) {
            errors.push(ValidationError::Duplicate(name.clone()));
        }
        validate_endpoint(endpoint, &name, &mut errors);
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_endpoint(endpoint: &EndpointConfig, name: &str, errors: &mut Vec<ValidationError>) {
    if !is_literal_path(&endpoint.path) {
        errors.push(ValidationError::Path(endpoint.path.clone()));
    }
    if !(100..=999).contains(&endpoint.status) {
        errors.push(ValidationError::Status {
            endpoint: name.to_string(),
            status: endpoint.status,
        });
    }

    let deadlines = [
        ("read", endpoint.read_deadline.as_ref()),
        ("write", endpoint.write_deadline.as_ref()),
    ];
    for (direction, deadline) in deadlines {
        if let Some(deadline) = deadline {
            validate_deadline(deadline, name, direction, errors);
        }
    }
}

/// Endpoints are matched literally; captures and wildcards are not allowed.
fn is_literal_path(path: &str) -> bool {
    path.starts_with('/')
        && !path.contains(['{', '}'])
        && path
            .split('/')
            .all(|segment| !segment.starts_with(':') && !segment.starts_with('*'))
}

fn validate_deadline(
    deadline: &DeadlineConfig,
    endpoint: &str,
    direction: &'static str,
    errors: &mut Vec<ValidationError>,
) {
    if deadline.after_ms == 0 {
        errors.push(ValidationError::ZeroDeadline {
            endpoint: endpoint.to_string(),
            direction,
        });
    }
    if let (ActionKind::Respond, Some(status)) = (deadline.action, deadline.status) {
        if !(400..=599).contains(&status) {
            errors.push(ValidationError::TimeoutStatus {
                endpoint: endpoint.to_string(),
                direction,
                status,
            });
        }
    }
}
