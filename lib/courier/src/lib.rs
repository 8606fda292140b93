//! Layered outbound HTTP pipeline.
//!
//! Every outbound request the embedding service makes flows through one
//! assembled [`Pipeline`]: a process-wide [`SharedPool`] (or a dedicated
//! proxied transport) wrapped by an optional body-capture tracing layer and
//! a latency metrics layer. Pipelines are built once per logical
//! destination and construction never fails; proxy problems degrade to the
//! shared pool with a log line.
//!
//! # Example
//!
//! ```ignore
//! use courier::prelude::*;
//! use courier::{TlsPolicy, TlsSettings};
//!
//! // Once at startup
//! let tls = TlsPolicy::from_settings(&TlsSettings::default())?;
//! let pool = SharedPool::new(tls);
//!
//! // Once per logical destination
//! let pipeline = Pipeline::builder(&pool)
//!     .config(PipelineConfig { clustered: false, local: true })
//!     .proxy_url("http://proxy.internal:3128")
//!     .build();
//!
//! let response = pipeline.get("https://images.internal/api/images").await?;
//! assert!(response.is_success());
//! ```

mod cancel;
mod config;
mod connector;
pub mod middleware;
mod pipeline;
pub mod prelude;
mod transport;

// Re-export pipeline types
pub use config::{PipelineConfig, TlsSettings};
pub use connector::TlsPolicy;
pub use pipeline::{BoxedDoer, DoerFuture, Pipeline, PipelineBuilder};
pub use transport::SharedPool;

// Re-export tower for middleware composition
pub use tower;

// Re-export core types
pub use courier_core::{
    Body, ByteStream, Direction, Doer, DoerExt, Error, Request, RequestBuilder, Response, Result,
    from_json, to_json,
};

// Re-export http, url, and tokio-util types used throughout the API
pub use courier_core::{
    CancellationToken, HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Url, header,
};
