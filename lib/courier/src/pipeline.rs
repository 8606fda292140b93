//! Pipeline assembly: transport selection, proxying, and decoration.
//!
//! A [`Pipeline`] is built once per logical destination from a
//! [`SharedPool`] and executes every outbound request through a fixed
//! decorator chain: pool-or-proxy transport, then optional body-capture
//! tracing, then metrics on the outside. Construction never fails; a proxy
//! that cannot be honored degrades to the shared pool with a log line.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use http::Uri;
use hyper_util::{
    client::legacy::{
        Client,
        connect::{HttpConnector, proxy::Tunnel},
    },
    rt::TokioExecutor,
};
use tower::Layer;
use tower::util::BoxCloneService;
use tower_service::Service;
use tracing::{Level, debug, enabled, warn};

use courier_core::{Doer, Error, Request, Response, Result};

use crate::config::PipelineConfig;
use crate::middleware::{MetricsLayer, TRACE_TARGET, TracingLayer};
use crate::transport::{SharedPool, Transport};

/// Type-erased doer stage for decorator composition.
///
/// Every stage of a chain is boxed to this type, so layers compose without
/// exposing nested generics.
pub type BoxedDoer = BoxCloneService<Request, Response, Error>;

/// Future type for the tower service implementation.
pub type DoerFuture = Pin<Box<dyn Future<Output = Result<Response>> + Send + 'static>>;

/// Thread-safe wrapper for [`BoxedDoer`].
///
/// This wrapper uses a Mutex to make the service Sync, which is required
/// by the [`Doer`] trait.
#[derive(Clone)]
struct SyncService {
    inner: Arc<Mutex<BoxedDoer>>,
}

impl SyncService {
    fn new(service: BoxedDoer) -> Self {
        Self {
            inner: Arc::new(Mutex::new(service)),
        }
    }

    fn call(&self, request: Request) -> DoerFuture {
        // Lock, clone the service, and release the lock immediately
        let mut service = self
            .inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone();

        Box::pin(async move { service.call(request).await })
    }
}

/// An assembled outbound pipeline.
///
/// Obtained from [`Pipeline::builder`]. The decorator chain is fixed at
/// construction and shared by clones; there is no way to re-layer an
/// existing pipeline.
///
/// # Example
///
/// ```ignore
/// use courier::{Pipeline, PipelineConfig, SharedPool};
///
/// let pool = SharedPool::default();
/// let pipeline = Pipeline::builder(&pool)
///     .config(PipelineConfig { clustered: false, local: true })
///     .proxy_url("http://proxy.internal:3128")
///     .build();
/// ```
#[derive(Clone)]
pub struct Pipeline {
    service: SyncService,
    config: PipelineConfig,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Pipeline {
    /// Create a new pipeline builder on the given pool.
    #[must_use]
    pub fn builder(pool: &SharedPool) -> PipelineBuilder {
        PipelineBuilder {
            pool: pool.clone(),
            config: PipelineConfig::default(),
            proxy_url: None,
        }
    }

    /// Deployment-mode switches the pipeline was built with.
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

impl Doer for Pipeline {
    async fn execute(&self, request: Request) -> Result<Response> {
        self.service.call(request).await
    }
}

impl Service<Request> for Pipeline {
    type Response = Response;
    type Error = Error;
    type Future = DoerFuture;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
        // SyncService is always ready (the underlying service is polled when called)
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: Request) -> Self::Future {
        self.service.call(request)
    }
}

/// Builder for [`Pipeline`].
///
/// Building never fails. The proxy URL is honored on a best-effort basis:
/// clustered deployments refuse it with a warning and an unparsable URL is
/// ignored with a debug line, both degrading to the shared pool.
#[derive(Debug)]
pub struct PipelineBuilder {
    pool: SharedPool,
    config: PipelineConfig,
    proxy_url: Option<String>,
}

impl PipelineBuilder {
    /// Set the deployment-mode switches.
    #[must_use]
    pub const fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Route this pipeline's traffic through the given proxy.
    ///
    /// An empty string means no proxy. The dedicated proxied transport
    /// applies the pool's TLS policy, so trust decisions stay identical.
    #[must_use]
    pub fn proxy_url(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    /// Build the pipeline with its full decorator chain.
    #[must_use]
    pub fn build(self) -> Pipeline {
        let mut service = self.select_transport();

        // Body capture is only for locally running, non-clustered processes,
        // and only when TRACE is already live at build time. The layer
        // re-checks verbosity on every call.
        if self.config.local && enabled!(target: TRACE_TARGET, Level::TRACE) {
            service = BoxCloneService::new(TracingLayer::new().layer(service));
        }

        // Metrics are always outermost so every call is observed.
        let service = BoxCloneService::new(MetricsLayer::new().layer(service));

        Pipeline {
            service: SyncService::new(service),
            config: self.config,
        }
    }

    /// Pick the base transport: the shared pool, or a dedicated proxied
    /// client when a usable proxy URL was given.
    fn select_transport(&self) -> BoxedDoer {
        let proxy = self.proxy_url.as_deref().unwrap_or_default();
        if proxy.is_empty() {
            return BoxCloneService::new(self.pool.transport());
        }

        if self.config.clustered {
            warn!(
                proxy,
                "proxy is not supported in a clustered deployment, using the shared pool"
            );
            return BoxCloneService::new(self.pool.transport());
        }

        let Some(uri) = parse_proxy(proxy) else {
            debug!(proxy, "ignoring unparsable proxy URL, using the shared pool");
            return BoxCloneService::new(self.pool.transport());
        };

        debug!(proxy, "creating dedicated transport with proxy");
        let mut http = HttpConnector::new();
        http.enforce_http(false);
        let connector = self.pool.tls().wrap(Tunnel::new(uri, http));
        let client = Client::builder(TokioExecutor::new()).build(connector);
        BoxCloneService::new(Transport::new(client))
    }
}

/// A usable proxy URL has a scheme and a host; anything else selects the
/// shared pool instead.
fn parse_proxy(raw: &str) -> Option<Uri> {
    let uri: Uri = raw.parse().ok()?;
    if uri.scheme().is_none() || uri.host().is_none() {
        return None;
    }
    Some(uri)
}
