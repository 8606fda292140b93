//! Core types and traits for the courier outbound HTTP pipeline.
//!
//! This crate provides the foundational types used by courier:
//! - [`Request`] and [`RequestBuilder`] - HTTP request types
//! - [`Response`] - HTTP response type
//! - [`Body`] - buffered or streaming HTTP bodies
//! - [`Error`] and [`Result`] - Error handling, including single-level
//!   failure wrapping across decorator boundaries
//! - [`Doer`] - Core trait for request execution
//! - [`Method`], [`StatusCode`], [`HeaderMap`], [`header`] - re-exported
//!   from the `http` crate
//! - [`Url`] - re-exported from the `url` crate

mod body;
mod doer;
mod error;
pub mod prelude;
mod request;
mod response;

pub use body::{Body, ByteStream, from_json, to_json};
pub use doer::{Doer, DoerExt};
pub use error::{Direction, Error, Result};
pub use request::{Request, RequestBuilder};
pub use response::Response;

// Re-export http, url, and tokio-util types used throughout the API
pub use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, header};
pub use tokio_util::sync::CancellationToken;
pub use url::Url;
