//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (hyper HTTP/1.1 driver, controller per connection)
//!     → Axum router (endpoint table)
//!     → handlers.rs (open exchange, run the endpoint's shape)
//!     → body.rs (request/response end-of-stream → complete_read / complete_write)
//!     → Send to client, or drop the socket on abort
//! ```

pub mod body;
pub mod handlers;
pub mod server;

pub use body::TrackedBody;
pub use server::HttpServer;
