//! Endpoint handlers.
//!
//! Every endpoint runs the same lifecycle: open an exchange, arm the read
//! deadline, produce the response according to the endpoint's [`Shape`], and
//! hand the response back wrapped so its end-of-stream completes the write.
//!
//! ```text
//! immediate       begin_write → respond
//! delayed         begin_write → sleep(delay) → respond       (body never read)
//! streaming-read  drain body → begin_write → sleep(delay) → respond
//! ```

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};
use http_body::Body as HttpBody;
use std::pin::Pin;
use std::sync::Arc;

use crate::config::{EndpointConfig, Shape};
use crate::exchange::{Exchange, LifecycleController};
use crate::http::body::TrackedBody;

/// Serve one request for `endpoint` on the connection owned by `controller`.
pub async fn handle(
    endpoint: Arc<EndpointConfig>,
    controller: LifecycleController,
    request: Request<Body>,
) -> Response {
    let exchange = controller.open();
    tracing::info!(
        exchange = %exchange.id(),
        method = %endpoint.method,
        path = %endpoint.path,
        "Request received"
    );

    let (parts, body) = request.into_parts();
    let head = parts.method == Method::HEAD;
    exchange.begin_read(endpoint.read());
    let body = if body.is_end_stream() {
        exchange.complete_read();
        body
    } else {
        TrackedBody::request(body, exchange.clone())
    };
    let request = Request::from_parts(parts, body);

    let response = exchange
        .run(produce(&endpoint, &exchange, request))
        .await;
    if head {
        // No body goes out for HEAD; the head itself is the whole response.
        exchange.complete_write();
        return response;
    }
    TrackedBody::response(response, exchange)
}

async fn produce(endpoint: &EndpointConfig, exchange: &Exchange, request: Request<Body>) -> Response {
    match endpoint.shape {
        Shape::Immediate => {
            exchange.begin_write(endpoint.write());
            reply(endpoint)
        }
        Shape::Delayed => {
            exchange.begin_write(endpoint.write());
            tokio::time::sleep(endpoint.delay_duration()).await;
            reply(endpoint)
        }
        Shape::StreamingRead => {
            match drain(request.into_body()).await {
                Ok(received) => {
                    tracing::info!(exchange = %exchange.id(), bytes = received, "Upload ended");
                }
                Err(error) => {
                    tracing::warn!(exchange = %exchange.id(), error = %error, "Upload failed");
                    return (StatusCode::BAD_REQUEST, "Upload failed").into_response();
                }
            }
            exchange.begin_write(endpoint.write());
            tokio::time::sleep(endpoint.delay_duration()).await;
            reply(endpoint)
        }
    }
}

fn reply(endpoint: &EndpointConfig) -> Response {
    (endpoint.status_code(), endpoint.body.clone()).into_response()
}

/// Consume a body to end-of-stream, discarding the data.
async fn drain(mut body: Body) -> Result<u64, axum::Error> {
    let mut received = 0u64;
    while let Some(frame) = std::future::poll_fn(|cx| Pin::new(&mut body).poll_frame(cx)).await {
        if let Ok(data) = frame?.into_data() {
            received += data.len() as u64;
        }
    }
    Ok(received)
}
