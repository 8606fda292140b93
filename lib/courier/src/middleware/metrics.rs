//! Latency metrics middleware using the metrics crate facade.
//!
//! Records exactly one observation per call:
//! - `http_client_request_duration_milliseconds` (histogram): wall-clock
//!   duration in whole milliseconds, labeled by method and status bucket
//!
//! The status bucket is the status class of the response ("2xx", "4xx",
//! ...); calls that produce no response at all land in "5xx". A response
//! outside the 2xx class additionally logs one warning. Failures are
//! observed first and then passed up wrapped.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Instant;

use http::StatusCode;
use tower::{Layer, Service};
use tracing::warn;

use courier_core::{Error, Request, Response, Result};

/// Labels used for metrics.
const LABEL_METHOD: &str = "method";
const LABEL_STATUS: &str = "status";

/// Metric names.
const METRIC_REQUEST_DURATION: &str = "http_client_request_duration_milliseconds";

/// Layer that records request latency metrics.
///
/// Always the outermost decorator of a pipeline, so the observed duration
/// covers the whole chain including body capture.
///
/// # Example
///
/// ```ignore
/// use courier::middleware::MetricsLayer;
///
/// let layer = MetricsLayer::new();
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer {
    _private: (),
}

impl MetricsLayer {
    /// Create a new metrics layer.
    #[must_use]
    pub fn new() -> Self {
        Self { _private: () }
    }
}

impl<S> Layer<S> for MetricsLayer {
    type Service = Metrics<S>;

    fn layer(&self, inner: S) -> Self::Service {
        Metrics { inner }
    }
}

/// Service that records request latency metrics.
#[derive(Debug, Clone)]
pub struct Metrics<S> {
    inner: S,
}

impl<S> Metrics<S> {
    /// Create a new metrics service wrapping the given service.
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Service<Request> for Metrics<S>
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

    fn call(&mut self, request: Request) -> Self::Future {
        let method = request.method().to_string();
        let url = request.url().to_string();
        let start = Instant::now();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let result = inner.call(request).await;

            let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);

            let bucket = match &result {
                Ok(response) => {
                    let bucket = status_bucket(response.status());
                    if bucket != "2xx" {
                        warn!(
                            status = response.status().as_u16(),
                            method = %method,
                            url = %url,
                            "request returned unexpected status"
                        );
                    }
                    bucket
                }
                // No response obtained counts against the server side.
                Err(_) => "5xx",
            };

            #[allow(clippy::cast_precision_loss)]
            let observed = elapsed_ms as f64;
            metrics::histogram!(
                METRIC_REQUEST_DURATION,
                LABEL_METHOD => method,
                LABEL_STATUS => bucket,
            )
            .record(observed);

            result.map_err(Error::wrapped)
        })
    }
}

/// Status class label, e.g. "2xx" for 204.
///
/// Non-standard classes above 5xx are folded into "5xx", the bucket for
/// exchanges without a usable outcome.
fn status_bucket(status: StatusCode) -> &'static str {
    match status.as_u16() / 100 {
        1 => "1xx",
        2 => "2xx",
        3 => "3xx",
        4 => "4xx",
        _ => "5xx",
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use assert2::let_assert;
    use http::{HeaderMap, Method};
    use metrics::{
        Counter, Gauge, Histogram, HistogramFn, Key, KeyName, Metadata, Recorder, SharedString,
        Unit,
    };
    use tower::ServiceExt;
    use url::Url;

    use courier_core::Body;

    use super::*;

    /// Mock service that returns configurable responses.
    #[derive(Clone)]
    struct MockService {
        status: StatusCode,
        call_count: Arc<AtomicU32>,
        should_error: bool,
    }

    impl MockService {
        fn new(status: StatusCode) -> Self {
            Self {
                status,
                call_count: Arc::new(AtomicU32::new(0)),
                should_error: false,
            }
        }

        fn with_error() -> Self {
            Self {
                status: StatusCode::OK,
                call_count: Arc::new(AtomicU32::new(0)),
                should_error: true,
            }
        }

        fn call_count(&self) -> u32 {
            self.call_count.load(Ordering::SeqCst)
        }
    }

    impl Service<Request> for MockService {
        type Response = Response;
        type Error = Error;
        type Future = Pin<Box<dyn Future<Output = Result<Self::Response>> + Send>>;

        fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<()>> {
            Poll::Ready(Ok(()))
        }

        fn call(&mut self, _request: Request) -> Self::Future {
            self.call_count.fetch_add(1, Ordering::SeqCst);
            let status = self.status;
            let should_error = self.should_error;

            Box::pin(async move {
                if should_error {
                    Err(Error::connection("mock refused"))
                } else {
                    Ok(Response::new(status, HeaderMap::new(), Body::empty()))
                }
            })
        }
    }

    fn create_request() -> Request {
        let url = Url::parse("https://example.com/test").expect("valid url");
        Request::builder(Method::GET, url).build()
    }

    /// Recorder that keeps every histogram observation with its key.
    #[derive(Clone, Default)]
    struct RecordingRecorder {
        observations: Arc<Mutex<Vec<(Key, f64)>>>,
    }

    impl RecordingRecorder {
        fn observations(&self) -> Vec<(Key, f64)> {
            self.observations.lock().expect("lock").clone()
        }
    }

    struct RecordedHistogram {
        key: Key,
        observations: Arc<Mutex<Vec<(Key, f64)>>>,
    }

    impl HistogramFn for RecordedHistogram {
        fn record(&self, value: f64) {
            self.observations
                .lock()
                .expect("lock")
                .push((self.key.clone(), value));
        }
    }

    impl Recorder for RecordingRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::noop()
        }

        fn register_histogram(&self, key: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::from_arc(Arc::new(RecordedHistogram {
                key: key.clone(),
                observations: Arc::clone(&self.observations),
            }))
        }
    }

    /// Run async test code with the local recorder installed on this thread.
    fn with_recorder(recorder: &RecordingRecorder, test: impl Future<Output = ()>) {
        metrics::with_local_recorder(recorder, || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("runtime");
            runtime.block_on(test);
        });
    }

    fn labels(key: &Key) -> Vec<(&str, &str)> {
        key.labels().map(|label| (label.key(), label.value())).collect()
    }

    #[test]
    #[allow(clippy::no_effect_underscore_binding)]
    fn metrics_layer_copy() {
        let layer = MetricsLayer::new();
        let _copied = layer;
        // Verify it was copied, not moved
        let _another = layer;
    }

    #[test]
    fn metrics_layer_default() {
        let _layer = MetricsLayer::default();
    }

    #[test]
    fn status_buckets() {
        assert_eq!(status_bucket(StatusCode::CONTINUE), "1xx");
        assert_eq!(status_bucket(StatusCode::OK), "2xx");
        assert_eq!(status_bucket(StatusCode::NO_CONTENT), "2xx");
        assert_eq!(status_bucket(StatusCode::MOVED_PERMANENTLY), "3xx");
        assert_eq!(status_bucket(StatusCode::NOT_FOUND), "4xx");
        assert_eq!(status_bucket(StatusCode::INTERNAL_SERVER_ERROR), "5xx");
        assert_eq!(status_bucket(StatusCode::BAD_GATEWAY), "5xx");
    }

    #[tokio::test]
    async fn metrics_service_success() {
        let mock = MockService::new(StatusCode::OK);
        let mut service = MetricsLayer::new().layer(mock.clone());

        let result = service
            .ready()
            .await
            .expect("ready")
            .call(create_request())
            .await;

        assert_eq!(result.expect("response").status(), StatusCode::OK);
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn non_success_response_is_not_an_error() {
        let mock = MockService::new(StatusCode::INTERNAL_SERVER_ERROR);
        let mut service = MetricsLayer::new().layer(mock.clone());

        let result = service
            .ready()
            .await
            .expect("ready")
            .call(create_request())
            .await;

        assert_eq!(
            result.expect("response").status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn inner_failure_is_wrapped_once() {
        let mock = MockService::with_error();
        let mut service = MetricsLayer::new().layer(mock.clone());

        let err = service
            .ready()
            .await
            .expect("ready")
            .call(create_request())
            .await
            .expect_err("inner failure");

        assert_eq!(err.to_string(), "connection error: mock refused");
        let_assert!(Error::Wrapped(inner) = err);
        assert!(matches!(*inner, Error::Connection(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[test]
    fn records_one_observation_per_call() {
        let recorder = RecordingRecorder::default();
        with_recorder(&recorder, async {
            let mock = MockService::new(StatusCode::OK);
            let mut service = MetricsLayer::new().layer(mock);

            let response = service
                .ready()
                .await
                .expect("ready")
                .call(create_request())
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        });

        let observations = recorder.observations();
        assert_eq!(observations.len(), 1);

        let (key, value) = observations.first().expect("one observation");
        assert_eq!(key.name(), METRIC_REQUEST_DURATION);
        assert!(labels(key).contains(&(LABEL_METHOD, "GET")));
        assert!(labels(key).contains(&(LABEL_STATUS, "2xx")));
        assert!(*value >= 0.0);
    }

    #[test]
    fn observation_bucket_follows_status_class() {
        let recorder = RecordingRecorder::default();
        with_recorder(&recorder, async {
            let mock = MockService::new(StatusCode::NOT_FOUND);
            let mut service = MetricsLayer::new().layer(mock);

            let response = service
                .ready()
                .await
                .expect("ready")
                .call(create_request())
                .await
                .expect("response");
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        });

        let observations = recorder.observations();
        assert_eq!(observations.len(), 1);
        let (key, _) = observations.first().expect("one observation");
        assert!(labels(key).contains(&(LABEL_STATUS, "4xx")));
    }

    #[test]
    fn failure_without_response_lands_in_5xx() {
        let recorder = RecordingRecorder::default();
        with_recorder(&recorder, async {
            let mock = MockService::with_error();
            let mut service = MetricsLayer::new().layer(mock);

            let err = service
                .ready()
                .await
                .expect("ready")
                .call(create_request())
                .await
                .expect_err("inner failure");
            assert!(err.is_connection());
        });

        let observations = recorder.observations();
        assert_eq!(observations.len(), 1);
        let (key, _) = observations.first().expect("one observation");
        assert!(labels(key).contains(&(LABEL_STATUS, "5xx")));
    }

    #[test]
    fn every_call_is_observed() {
        let recorder = RecordingRecorder::default();
        with_recorder(&recorder, async {
            let mock = MockService::new(StatusCode::OK);
            let mut service = MetricsLayer::new().layer(mock.clone());

            for _ in 0..5 {
                let result = service
                    .ready()
                    .await
                    .expect("ready")
                    .call(create_request())
                    .await;
                assert!(result.is_ok());
            }
            assert_eq!(mock.call_count(), 5);
        });

        assert_eq!(recorder.observations().len(), 5);
    }

    #[tokio::test]
    async fn unexpected_status_logs_one_warning() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = MockService::new(StatusCode::NOT_FOUND);
        let mut service = MetricsLayer::new().layer(mock);

        let response = service
            .ready()
            .await
            .expect("ready")
            .call(create_request())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let logged = writer.contents();
        assert_eq!(logged.matches("request returned unexpected status").count(), 1);
        assert!(logged.contains("status=404"));
    }

    #[tokio::test]
    async fn success_logs_no_warning() {
        let writer = CaptureWriter::default();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::WARN)
            .with_writer(writer.clone())
            .with_ansi(false)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let mock = MockService::new(StatusCode::OK);
        let mut service = MetricsLayer::new().layer(mock);

        let response = service
            .ready()
            .await
            .expect("ready")
            .call(create_request())
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::OK);

        assert!(writer.contents().is_empty());
    }

    #[test]
    fn metrics_new() {
        let inner = MockService::new(StatusCode::OK);
        let service = Metrics::new(inner);
        // Verify service was created
        assert_eq!(service.inner.status, StatusCode::OK);
    }

    /// Writer that captures formatted log output for assertions.
    #[derive(Clone, Default)]
    struct CaptureWriter {
        buffer: Arc<Mutex<Vec<u8>>>,
    }

    impl CaptureWriter {
        fn contents(&self) -> String {
            String::from_utf8_lossy(&self.buffer.lock().expect("lock")).into_owned()
        }
    }

    impl std::io::Write for CaptureWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.buffer.lock().expect("lock").extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CaptureWriter {
        type Writer = Self;

        fn make_writer(&'a self) -> Self::Writer {
            self.clone()
        }
    }
}
