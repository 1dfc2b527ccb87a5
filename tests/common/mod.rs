//! Shared utilities for integration testing.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use deadline_server::config::{EndpointConfig, ServerConfig};
use deadline_server::exchange::{ExchangeId, Recorder};
use deadline_server::net::Listener;
use deadline_server::{HttpServer, Phase, Shutdown};

/// A server bound to an ephemeral port, recording every lifecycle event.
pub struct TestServer {
    pub addr: SocketAddr,
    pub recorder: Arc<Recorder>,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    /// Poll until `count` exchanges have been released, or panic after `within`.
    pub async fn wait_for_released(&self, count: usize, within: Duration) -> Vec<(ExchangeId, Phase)> {
        let started = tokio::time::Instant::now();
        loop {
            let released = self.recorder.released();
            if released.len() >= count {
                return released;
            }
            if started.elapsed() > within {
                panic!(
                    "expected {count} released exchanges, saw {}: {:?}",
                    released.len(),
                    self.recorder.events()
                );
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a server exposing `endpoints` on 127.0.0.1 with a random port.
pub async fn start_server(endpoints: Vec<EndpointConfig>) -> TestServer {
    let mut config = ServerConfig::default();
    config.endpoints = endpoints;
    config.timeouts.shutdown_grace_secs = 1;

    let tcp = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let listener = Listener::from_tcp(tcp, 64);
    let addr = listener.local_addr().unwrap();

    let recorder = Arc::new(Recorder::new());
    let shutdown = Shutdown::new();
    let server = HttpServer::with_observer(config, recorder.clone());
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        recorder,
        shutdown,
    }
}

/// A client that opens a fresh connection for every request.
pub fn fresh_client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}
