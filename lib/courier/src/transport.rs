//! Shared connection pool and the transport that executes requests.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::TryStreamExt;
use http_body::Frame;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, BodyStream, Full, StreamBody};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::{Connect, HttpConnector};
use hyper_util::rt::TokioExecutor;
use tower_service::Service;

use courier_core::{Body, Error, Request, Response, Result};

use crate::cancel::bounded;
use crate::connector::TlsPolicy;

/// Wire body type handed to hyper.
pub(crate) type OutboundBody = UnsyncBoxBody<Bytes, Error>;

/// Process-wide connection pool.
///
/// Create one per process at startup and pass it to every
/// [`Pipeline::builder`] call. Cloning is cheap and shares the same
/// underlying pool. Connection reuse and idle handling are the pool's own
/// business; no tuning knobs are exposed.
///
/// [`Pipeline::builder`]: crate::Pipeline::builder
#[derive(Clone)]
pub struct SharedPool {
    client: Client<HttpsConnector<HttpConnector>, OutboundBody>,
    tls: TlsPolicy,
}

impl std::fmt::Debug for SharedPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedPool").finish_non_exhaustive()
    }
}

impl SharedPool {
    /// Create the pool with the given TLS policy.
    #[must_use]
    pub fn new(tls: TlsPolicy) -> Self {
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let connector = tls.wrap(http);

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self { client, tls }
    }

    /// TLS policy the pool was built with.
    ///
    /// Dedicated proxied transports apply the same policy.
    #[must_use]
    pub const fn tls(&self) -> &TlsPolicy {
        &self.tls
    }

    /// Transport executing on this pool.
    pub(crate) fn transport(&self) -> Transport<HttpsConnector<HttpConnector>> {
        Transport::new(self.client.clone())
    }
}

impl Default for SharedPool {
    /// Pool with the default TLS policy (webpki roots, no client auth).
    fn default() -> Self {
        Self::new(TlsPolicy::default())
    }
}

/// Direct transport executing requests on a hyper client.
///
/// The terminal stage of every chain: no decoration, no retries, and no
/// timeout of its own. The request's deadline and cancellation token bound
/// the hyper call.
#[derive(Clone)]
pub(crate) struct Transport<C> {
    client: Client<C, OutboundBody>,
}

impl<C> Transport<C> {
    pub(crate) const fn new(client: Client<C, OutboundBody>) -> Self {
        Self { client }
    }
}

impl<C> Transport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    async fn execute(self, request: Request) -> Result<Response> {
        let deadline = request.deadline();
        let cancellation = request.cancellation().cloned();

        let hyper_request = build_hyper_request(request)?;

        let response = bounded(deadline, cancellation.as_ref(), async {
            self.client
                .request(hyper_request)
                .await
                .map_err(map_hyper_error)
        })
        .await?;

        let (parts, incoming) = response.into_parts();

        // Trailer frames decode to empty chunks and are dropped downstream.
        let stream = BodyStream::new(incoming)
            .map_ok(|frame| frame.into_data().unwrap_or_default())
            .map_err(|e| Error::connection(e.to_string()));

        Ok(Response::new(
            parts.status,
            parts.headers,
            Body::from_stream(stream),
        ))
    }
}

impl<C> Service<Request> for Transport<C>
where
    C: Connect + Clone + Send + Sync + 'static,
{
    type Response = Response;
    type Error = Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let transport = self.clone();
        Box::pin(async move { transport.execute(request).await })
    }
}

/// Build a hyper request from a courier request.
fn build_hyper_request(request: Request) -> Result<http::Request<OutboundBody>> {
    let (method, url, headers, body) = request.into_parts();

    let mut builder = http::Request::builder().method(method).uri(url.as_str());
    if let Some(builder_headers) = builder.headers_mut() {
        *builder_headers = headers;
    }

    let body = body.map_or_else(empty_body, convert_body);

    builder
        .body(body)
        .map_err(|e| Error::invalid_request(e.to_string()))
}

/// Buffered bodies keep an exact content length; streams are sent chunked.
fn convert_body(body: Body) -> OutboundBody {
    match body {
        Body::Full(bytes) => Full::new(bytes)
            .map_err(|never| match never {})
            .boxed_unsync(),
        Body::Stream(stream) => StreamBody::new(stream.map_ok(Frame::data)).boxed_unsync(),
    }
}

fn empty_body() -> OutboundBody {
    Full::default()
        .map_err(|never| match never {})
        .boxed_unsync()
}

#[allow(clippy::needless_pass_by_value)]
fn map_hyper_error(err: hyper_util::client::legacy::Error) -> Error {
    let msg = err.to_string();

    if err.is_connect() {
        return Error::connection(msg);
    }

    if msg.contains("ssl") || msg.contains("tls") || msg.contains("certificate") {
        return Error::tls(msg);
    }

    Error::connection(msg)
}
