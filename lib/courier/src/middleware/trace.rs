//! Request/response body capture middleware.
//!
//! When TRACE verbosity is active for [`TRACE_TARGET`], the service drains
//! each body into memory, logs it together with the exchange's method, URL,
//! content length and headers, and puts an identical buffered copy back in
//! place, so the wire and the caller see exactly the bytes that were
//! captured. When TRACE is not active, bodies pass through untouched (a
//! streaming body stays streaming) and only a discardable trace line is
//! emitted.
//!
//! Verbosity is re-checked on every call, so raising or lowering the log
//! level at runtime starts or stops capture without rebuilding the
//! pipeline.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use bytes::Bytes;
use http::Method;
use tokio_util::sync::CancellationToken;
use tower::{Layer, Service};
use tracing::{Level, enabled, trace};

use courier_core::{Body, Direction, Error, Request, Response, Result};

use crate::cancel::bounded;

/// Log target for captured bodies.
///
/// Enable TRACE for this target to turn capture on, e.g. with the filter
/// directive `courier::trace=trace`.
pub const TRACE_TARGET: &str = "courier::trace";

/// Layer that captures request and response bodies at TRACE verbosity.
///
/// Capture buffers entire bodies in memory; the pipeline builder only
/// attaches this layer to locally running, non-clustered processes.
///
/// # Example
///
/// ```ignore
/// use courier::middleware::TracingLayer;
///
/// let layer = TracingLayer::new();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLayer {
    _private: (),
}

impl TracingLayer {
    /// Create a new tracing layer.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl<S> Layer<S> for TracingLayer {
    type Service = Tracing<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Tracing { inner }
    }
}

/// Service that captures bodies without consuming them.
#[derive(Debug, Clone)]
pub struct Tracing<S> {
    inner: S,
}

impl<S> Tracing<S> {
    /// Create a new tracing service wrapping the given service.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Service<Request> for Tracing<S>
where
    S: Service<Request, Response = Response, Error = Error> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<()>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request) -> Self::Future {
        let mut inner = self.inner.clone();

        Box::pin(async move {
            if enabled!(target: TRACE_TARGET, Level::TRACE) {
                capture_request(&mut request).await?;
            } else {
                trace!(
                    target: TRACE_TARGET,
                    method = %request.method(),
                    url = %request.url(),
                    "request with no body"
                );
            }

            let method = request.method().clone();
            let url = request.url().to_string();
            let deadline = request.deadline();
            let cancellation = request.cancellation().cloned();

            let mut response = inner.call(request).await.map_err(Error::wrapped)?;

            if enabled!(target: TRACE_TARGET, Level::TRACE) {
                capture_response(&mut response, &method, &url, deadline, cancellation.as_ref())
                    .await?;
            } else {
                trace!(
                    target: TRACE_TARGET,
                    method = %method,
                    url = %url,
                    "response with no body"
                );
            }

            Ok(response)
        })
    }
}

/// Drain, log, and restore the request body.
async fn capture_request(request: &mut Request) -> Result<()> {
    let Some(body) = request.take_body() else {
        trace!(
            target: TRACE_TARGET,
            method = %request.method(),
            url = %request.url(),
            "request with no body"
        );
        return Ok(());
    };

    let bytes = drain(
        Direction::Request,
        request.deadline(),
        request.cancellation(),
        body,
    )
    .await?;

    trace!(
        target: TRACE_TARGET,
        method = %request.method(),
        url = %request.url(),
        content_length = bytes.len(),
        headers = ?request.headers(),
        body = %String::from_utf8_lossy(&bytes),
        "request body captured"
    );
    request.set_body(bytes);
    Ok(())
}

/// Drain, log, and restore the response body.
async fn capture_response(
    response: &mut Response,
    method: &Method,
    url: &str,
    deadline: Option<Instant>,
    cancellation: Option<&CancellationToken>,
) -> Result<()> {
    let body = response.take_body();

    let bytes = drain(Direction::Response, deadline, cancellation, body).await?;

    trace!(
        target: TRACE_TARGET,
        method = %method,
        url = %url,
        status = response.status().as_u16(),
        content_length = bytes.len(),
        headers = ?response.headers(),
        body = %String::from_utf8_lossy(&bytes),
        "response body captured"
    );
    response.set_body(bytes);
    Ok(())
}

/// Buffer a body under the request's deadline and cancellation.
///
/// Cancellation and deadline failures pass through as themselves so their
/// kind survives to the caller; an I/O failure while reading becomes a
/// body-read error for the given direction.
async fn drain(
    direction: Direction,
    deadline: Option<Instant>,
    cancellation: Option<&CancellationToken>,
    body: Body,
) -> Result<Bytes> {
    match bounded(deadline, cancellation, body.into_bytes()).await {
        Ok(bytes) => Ok(bytes),
        Err(err @ (Error::Canceled | Error::Timeout)) => Err(err),
        Err(err) => Err(Error::body_read(direction, err)),
    }
}
