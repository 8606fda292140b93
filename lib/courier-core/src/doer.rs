//! Request doer traits.
//!
//! - [`Doer`] - the one-operation interface every pipeline stage implements
//! - [`DoerExt`] - convenience verbs for callers
//!
//! A doer takes a request and produces either a response or a failure, and
//! does nothing else observable to its caller. Decorators are themselves
//! doers holding exactly one inner doer.

use std::future::Future;

use crate::{Request, Response, Result};

/// Core request execution trait.
///
/// Implementations must be safe to invoke concurrently from many tasks.
/// A non-2xx response is a successful execution; errors only describe
/// exchanges that produced no usable response.
pub trait Doer: Send + Sync {
    /// Execute an HTTP request and return the response.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails for any reason:
    /// - Network errors
    /// - TLS errors
    /// - Deadline elapsed or cancellation
    /// - Body capture failures
    fn execute(&self, request: Request) -> impl Future<Output = Result<Response>> + Send;
}

/// Extension trait for [`Doer`] with convenience methods.
pub trait DoerExt: Doer {
    /// Execute a GET request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the request fails.
    fn get(&self, url: &str) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let url = url::Url::parse(url)?;
            let request = Request::builder(http::Method::GET, url).build();
            self.execute(request).await
        }
    }

    /// Execute a POST request with a JSON body.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, serialization fails, or the
    /// request fails.
    fn post_json<T: serde::Serialize + Send + Sync>(
        &self,
        url: &str,
        body: &T,
    ) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let url = url::Url::parse(url)?;
            let request = Request::builder(http::Method::POST, url)
                .json(body)?
                .build();
            self.execute(request).await
        }
    }

    /// Execute a DELETE request.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the request fails.
    fn delete(&self, url: &str) -> impl Future<Output = Result<Response>> + Send {
        async move {
            let url = url::Url::parse(url)?;
            let request = Request::builder(http::Method::DELETE, url).build();
            self.execute(request).await
        }
    }
}

// Blanket implementation for all Doer implementors
impl<T: Doer> DoerExt for T {}
