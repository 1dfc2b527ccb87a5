//! Error types shared across subsystems.

use thiserror::Error;

use crate::net::listener::ListenerError;

/// Terminal failure outcomes of an exchange.
///
/// These are never raised on their own; they describe how an exchange ended
/// once its phase is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ExchangeError {
    /// The request body did not arrive before the read deadline.
    #[error("request body not received before the read deadline")]
    ReadTimeout,

    /// The response was not flushed before the write deadline.
    #[error("response not sent before the write deadline")]
    WriteTimeout,

    /// The connection was closed without a status code.
    #[error("connection aborted without a response")]
    AbortedConnection,
}

/// Errors that stop the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error(transparent)]
    Listener(#[from] ListenerError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
