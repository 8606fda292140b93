//! HTTP request building.
//!
//! Use [`Request::builder`] to construct requests with headers, query
//! parameters, bodies, and an optional deadline or cancellation token.
//!
//! # Example
//!
//! ```
//! use courier_core::{Method, Request};
//! use http::HeaderValue;
//!
//! let request = Request::builder(Method::GET, "https://api.example.com".parse().unwrap())
//!     .header(http::header::ACCEPT, HeaderValue::from_static("application/json"))
//!     .query("page", "1")
//!     .build();
//! ```

use std::time::{Duration, Instant};

use http::header::{AsHeaderName, IntoHeaderName};
use http::{HeaderMap, HeaderValue, Method};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::Body;

/// An outbound HTTP request with method, URL, headers, and optional body.
///
/// A request may also carry a deadline and a cancellation token; every
/// blocking point in the pipeline honors both. Requests are not cloneable
/// because a streaming body is readable only once.
#[derive(Debug)]
pub struct Request {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl Request {
    /// Creates a new [`RequestBuilder`].
    #[must_use]
    pub fn builder(method: Method, url: Url) -> RequestBuilder {
        RequestBuilder::new(method, url)
    }

    /// HTTP method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// Request URL.
    #[must_use]
    pub const fn url(&self) -> &Url {
        &self.url
    }

    /// Request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Mutable access to headers.
    #[must_use]
    pub const fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    /// First header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsHeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Request body.
    #[must_use]
    pub const fn body(&self) -> Option<&Body> {
        self.body.as_ref()
    }

    /// Take the body out, leaving `None` behind.
    #[must_use]
    pub const fn take_body(&mut self) -> Option<Body> {
        self.body.take()
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = Some(body.into());
    }

    /// Deadline after which the request must fail with a timeout.
    #[must_use]
    pub const fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Cancellation token observed by every blocking point.
    #[must_use]
    pub const fn cancellation(&self) -> Option<&CancellationToken> {
        self.cancellation.as_ref()
    }

    /// Consume into (method, url, headers, body).
    ///
    /// The deadline and cancellation token are dropped; read them first.
    #[must_use]
    pub fn into_parts(self) -> (Method, Url, HeaderMap, Option<Body>) {
        (self.method, self.url, self.headers, self.body)
    }
}

/// Builder for constructing [`Request`] instances.
///
/// Building never fails; the fallible pieces (URL parsing, JSON
/// serialization) fail before the builder exists or in [`Self::json`].
#[derive(Debug)]
pub struct RequestBuilder {
    method: Method,
    url: Url,
    headers: HeaderMap,
    body: Option<Body>,
    deadline: Option<Instant>,
    cancellation: Option<CancellationToken>,
}

impl RequestBuilder {
    /// Creates a new builder.
    #[must_use]
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: HeaderMap::new(),
            body: None,
            deadline: None,
            cancellation: None,
        }
    }

    /// Appends a header.
    ///
    /// Appending the same name twice keeps both values in order.
    #[must_use]
    pub fn header(mut self, name: impl IntoHeaderName, value: HeaderValue) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Appends a query parameter to the URL.
    #[must_use]
    pub fn query(mut self, name: &str, value: &str) -> Self {
        self.url.query_pairs_mut().append_pair(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Body>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn json<T: serde::Serialize>(self, value: &T) -> crate::Result<Self> {
        let body = crate::to_json(value)?;
        Ok(self
            .header(
                http::header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(body))
    }

    /// Sets the absolute deadline for the request.
    #[must_use]
    pub const fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the deadline relative to now.
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    /// Builds the [`Request`].
    #[must_use]
    pub fn build(self) -> Request {
        Request {
            method: self.method,
            url: self.url,
            headers: self.headers,
            body: self.body,
            deadline: self.deadline,
            cancellation: self.cancellation,
        }
    }
}
