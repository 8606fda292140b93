//! Doer-decorating middleware built on the tower service model.
//!
//! Each decorator wraps an inner service and adds one concern; chains are
//! assembled once by [`Pipeline::builder`](crate::Pipeline::builder) and
//! are immutable afterward. A failure crossing a decorator is wrapped
//! exactly once, so its nesting depth tells how many decorators it passed.
//!
//! - [`TracingLayer`]: captures request/response bodies at TRACE verbosity
//! - [`MetricsLayer`]: records latency and status-bucket observations
//!
//! # Example
//!
//! ```ignore
//! use courier::middleware::{MetricsLayer, TracingLayer};
//! use tower::ServiceBuilder;
//!
//! let service = ServiceBuilder::new()
//!     .layer(MetricsLayer::new())
//!     .layer(TracingLayer::new())
//!     .service(transport);
//! ```

mod metrics;
mod trace;

pub use metrics::{Metrics, MetricsLayer};
pub use trace::{TRACE_TARGET, Tracing, TracingLayer};

// Re-export tower types for convenience
pub use tower::{Layer, ServiceBuilder};
