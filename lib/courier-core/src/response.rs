//! HTTP response handling.
//!
//! [`Response`] provides access to status, headers, and body. The body may
//! still be a live network stream; [`Response::bytes`] and
//! [`Response::json`] buffer it.

use bytes::Bytes;
use http::{HeaderMap, HeaderValue, StatusCode};

use crate::Body;

/// An HTTP response with status, headers, and body.
///
/// Every obtained response is handed to the caller untouched, whatever its
/// status code. Checking [`Self::is_success`] is the caller's business.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Body,
}

impl Response {
    /// Creates a new response.
    #[must_use]
    pub fn new(status: StatusCode, headers: HeaderMap, body: Body) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// HTTP status code.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First header value by name.
    #[must_use]
    pub fn header(&self, name: impl http::header::AsHeaderName) -> Option<&HeaderValue> {
        self.headers.get(name)
    }

    /// Response body.
    #[must_use]
    pub const fn body(&self) -> &Body {
        &self.body
    }

    /// Take the body out, leaving an empty one behind.
    #[must_use]
    pub fn take_body(&mut self) -> Body {
        std::mem::replace(&mut self.body, Body::empty())
    }

    /// Replace the body.
    pub fn set_body(&mut self, body: impl Into<Body>) {
        self.body = body.into();
    }

    /// Consume into body.
    #[must_use]
    pub fn into_body(self) -> Body {
        self.body
    }

    /// Consume into (status, headers, body).
    #[must_use]
    pub fn into_parts(self) -> (StatusCode, HeaderMap, Body) {
        (self.status, self.headers, self.body)
    }

    /// Status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Buffer the entire body into bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body fails.
    pub async fn bytes(self) -> crate::Result<Bytes> {
        self.body.into_bytes().await
    }

    /// Buffer the body and deserialize it as JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if reading the body or deserialization fails.
    pub async fn json<T: serde::de::DeserializeOwned>(self) -> crate::Result<T> {
        let bytes = self.body.into_bytes().await?;
        crate::from_json(&bytes)
    }
}
