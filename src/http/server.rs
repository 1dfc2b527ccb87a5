//! HTTP server setup and connection driving.
//!
//! # Responsibilities
//! - Build the Axum router from the endpoint table
//! - Wire up middleware (tracing, request ID)
//! - Accept connections and serve them with hyper's HTTP/1.1 driver
//! - Give each connection a lifecycle controller and an abort path
//! - Stop accepting and drain connections on shutdown
//!
//! There is deliberately no framework-level request timeout layer: every
//! deadline is owned by an exchange and carries its own action.

use axum::{
    body::Body,
    extract::Extension,
    http::Request,
    routing::MethodRouter,
    Router,
};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioIo, TokioTimer};
use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, watch};
use tower::ServiceExt;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::exchange::{ExchangeObserver, LifecycleController};
use crate::http::handlers;
use crate::net::connection::{ConnectionControl, ConnectionTracker};
use crate::net::listener::{ConnectionPermit, Listener};
use crate::observability::TracingObserver;

/// HTTP server exposing the configured endpoints.
pub struct HttpServer {
    router: Router,
    config: ServerConfig,
    observer: Arc<dyn ExchangeObserver>,
}

impl HttpServer {
    /// Create a server that logs lifecycle events through `tracing`.
    pub fn new(config: ServerConfig) -> Self {
        Self::with_observer(config, Arc::new(TracingObserver))
    }

    /// Create a server that reports lifecycle events to `observer`.
    pub fn with_observer(config: ServerConfig, observer: Arc<dyn ExchangeObserver>) -> Self {
        let router = Self::build_router(&config);
        Self {
            router,
            config,
            observer,
        }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ServerConfig) -> Router {
        // Endpoints sharing a path become one method router.
        let mut routes: BTreeMap<String, MethodRouter> = BTreeMap::new();
        for endpoint in &config.endpoints {
            let filter = endpoint.method.filter();
            let path = endpoint.path.clone();
            let endpoint = Arc::new(endpoint.clone());
            let handler = move |Extension(controller): Extension<LifecycleController>,
                                request: Request<Body>| {
                handlers::handle(Arc::clone(&endpoint), controller, request)
            };
            let method_router = routes.remove(&path).unwrap_or_else(MethodRouter::new);
            routes.insert(path, method_router.on(filter, handler));
        }

        let mut router = Router::new();
        for (path, method_router) in routes {
            router = router.route(&path, method_router);
        }
        router
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// Run the server until `shutdown` fires, then drain open connections.
    pub async fn run(
        self,
        listener: Listener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            endpoints = self.config.endpoints.len(),
            "HTTP server starting"
        );

        let tracker = ConnectionTracker::new();
        let (drain_tx, drain_rx) = watch::channel(false);

        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr, permit)) => {
                        self.spawn_connection(stream, peer_addr, permit, &tracker, drain_rx.clone());
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Accept failed");
                        tokio::time::sleep(Duration::from_millis(50)).await;
                    }
                },
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting connections");
                    break;
                }
            }
        }

        drain_tx.send_replace(true);
        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        let remaining = tracker.wait_for_drain(grace).await;
        if remaining > 0 {
            tracing::warn!(remaining, "Shutdown grace period elapsed with open connections");
        }

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    fn spawn_connection(
        &self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        permit: ConnectionPermit,
        tracker: &ConnectionTracker,
        draining: watch::Receiver<bool>,
    ) {
        let guard = tracker.track();
        let control = ConnectionControl::new(guard.id());
        let controller = LifecycleController::new(control.clone(), Arc::clone(&self.observer));
        let router = self.router.clone();
        let header_read = Duration::from_secs(self.config.timeouts.header_read_secs);

        tokio::spawn(async move {
            let _permit = permit;
            let _guard = guard;
            serve_connection(stream, peer_addr, router, controller, control, header_read, draining)
                .await;
        });
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    router: Router,
    controller: LifecycleController,
    control: ConnectionControl,
    header_read: Duration,
    mut draining: watch::Receiver<bool>,
) {
    let service = service_fn(move |mut request: Request<Incoming>| {
        request.extensions_mut().insert(controller.clone());
        router.clone().oneshot(request)
    });

    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(header_read)
        .keep_alive(true);
    let connection = builder.serve_connection(TokioIo::new(stream), service);
    tokio::pin!(connection);

    let mut graceful = false;
    loop {
        tokio::select! {
            biased;
            _ = control.aborted() => {
                // Dropping the connection future closes the socket with no response.
                tracing::warn!(
                    connection_id = %control.id(),
                    peer_addr = %peer_addr,
                    exchanges = control.exchange_count(),
                    "Connection aborted"
                );
                break;
            }
            result = connection.as_mut() => {
                if let Err(error) = result {
                    tracing::debug!(
                        connection_id = %control.id(),
                        peer_addr = %peer_addr,
                        error = %error,
                        "Connection ended with error"
                    );
                }
                break;
            }
            _ = draining.wait_for(|draining| *draining), if !graceful => {
                connection.as_mut().graceful_shutdown();
                graceful = true;
            }
        }
    }
}
