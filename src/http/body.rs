//! Body wrappers that report end-of-stream to the exchange.
//!
//! # Responsibilities
//! - Request side: call `complete_read` once the body is fully received
//! - Response side: call `complete_write` once the body is fully handed off
//!
//! # Design Decisions
//! - Frames pass through untouched; only end-of-stream is observed
//! - hyper may stop polling once a sized body reports `is_end_stream`, and
//!   never polls a body that is empty from the start, so dropping a finished
//!   response body also counts as completion

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use http_body::{Body as HttpBody, Frame, SizeHint};
use std::pin::Pin;
use std::task::{Context, Poll};

use crate::exchange::{Exchange, TimeoutKind};

/// A body that notifies its exchange when it reaches end-of-stream.
pub struct TrackedBody {
    inner: Body,
    exchange: Exchange,
    direction: TimeoutKind,
    finished: bool,
}

impl TrackedBody {
    /// Wrap an inbound request body.
    pub fn request(inner: Body, exchange: Exchange) -> Body {
        Body::new(Self {
            inner,
            exchange,
            direction: TimeoutKind::Read,
            finished: false,
        })
    }

    /// Wrap the body of an outbound response.
    pub fn response(response: Response, exchange: Exchange) -> Response {
        response.map(|inner| {
            Body::new(Self {
                inner,
                exchange,
                direction: TimeoutKind::Write,
                finished: false,
            })
        })
    }

    fn finish(&mut self) {
        if self.finished {
            return;
        }
        self.finished = true;
        match self.direction {
            TimeoutKind::Read => self.exchange.complete_read(),
            TimeoutKind::Write => self.exchange.complete_write(),
        }
    }
}

impl HttpBody for TrackedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        let this = &mut *self;
        let polled = Pin::new(&mut this.inner).poll_frame(cx);
        match &polled {
            Poll::Ready(None) => this.finish(),
            Poll::Ready(Some(Ok(_))) if this.inner.is_end_stream() => this.finish(),
            Poll::Ready(Some(Err(error))) => {
                tracing::debug!(
                    exchange = %this.exchange.id(),
                    direction = %this.direction,
                    error = %error,
                    "Body stream failed"
                );
            }
            _ => {}
        }
        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for TrackedBody {
    fn drop(&mut self) {
        if self.direction == TimeoutKind::Write && self.inner.is_end_stream() {
            self.finish();
        }
    }
}
