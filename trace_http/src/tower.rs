//!
//! Tower plumbing for adding tracing instrumentation to an HTTP service stack
//!
//! For those not familiar with tower:
//!
//! - A Layer produces a Service
//! - A Service can then be called with a request which returns a Future
//! - This Future returns a response which contains a Body
//!

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures::ready;
use http::{Request, Response};
use pin_project::pin_project;
use tower::{Layer, Service};

use metric::{Metric, U64Counter, DurationHistogram};
use observability_deps::tracing::error;
use trace::{SpanContext, SpanGuard, TraceCollector};

/// Decorates a `tower::Service` to attach a span per request and record
/// request-count and latency metrics, grouped by HTTP status class.
#[derive(Debug, Clone)]
pub struct TraceLayer {
    collector: Option<Arc<dyn TraceCollector>>,
    requests: Arc<Metric<U64Counter>>,
    latency: Arc<Metric<DurationHistogram>>,
}

impl TraceLayer {
    pub fn new(registry: &metric::Registry, collector: Option<Arc<dyn TraceCollector>>) -> Self {
        Self {
            collector,
            requests: registry.register_counter("http_requests_total", "total HTTP requests served"),
            latency: registry.register_histogram("http_request_duration", "HTTP request latency"),
        }
    }
}

impl<S> Layer<S> for TraceLayer {
    type Service = TraceService<S>;

    fn layer(&self, service: S) -> Self::Service {
        TraceService {
            service,
            collector: self.collector.clone(),
            requests: Arc::clone(&self.requests),
            latency: Arc::clone(&self.latency),
        }
    }
}

/// Wraps an inner tower::Service and instruments its returned futures.
#[derive(Debug, Clone)]
pub struct TraceService<S> {
    service: S,
    collector: Option<Arc<dyn TraceCollector>>,
    requests: Arc<Metric<U64Counter>>,
    latency: Arc<Metric<DurationHistogram>>,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for TraceService<S>
where
    S: Service<Request<ReqBody>, Response = Response<ResBody>>,
{
    type Response = Response<ResBody>;
    type Error = S::Error;
    type Future = TracedFuture<S::Future>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&mut self, request: Request<ReqBody>) -> Self::Future {
        let path = request.uri().path().to_string();
        let qid = request
            .headers()
            .get("x-query-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let span_ctx = SpanContext::new(self.collector.clone());
        let guard = span_ctx.child(path, qid);

        TracedFuture {
            guard: Some(guard),
            start: std::time::Instant::now(),
            requests: Arc::clone(&self.requests),
            latency: Arc::clone(&self.latency),
            inner: self.service.call(request),
        }
    }
}

/// Wraps the future returned by a `tower::Service` so the span closes and
/// metrics record once the response (or error) is ready.
#[pin_project]
#[derive(Debug)]
pub struct TracedFuture<F> {
    guard: Option<SpanGuard>,
    start: std::time::Instant,
    requests: Arc<Metric<U64Counter>>,
    latency: Arc<Metric<DurationHistogram>>,
    #[pin]
    inner: F,
}

impl<F, ResBody, Error> Future for TracedFuture<F>
where
    F: Future<Output = Result<Response<ResBody>, Error>>,
{
    type Output = Result<Response<ResBody>, Error>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let result = ready!(self.as_mut().project().inner.poll(cx));

        let projected = self.as_mut().project();
        let status = match &result {
            Ok(response) => response.status().as_str().to_string(),
            Err(_) => {
                error!("error processing traced request");
                "error".to_string()
            }
        };
        projected.requests.recorder(vec![("status".into(), status)]).inc();
        projected.latency.recorder(vec![]).record(projected.start.elapsed());
        drop(projected.guard.take());

        Poll::Ready(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::Response;
    use std::convert::Infallible;
    use std::future::Ready;
    use tower::service_fn;

    fn ok_service(
        _req: Request<()>,
    ) -> Ready<Result<Response<()>, Infallible>> {
        std::future::ready(Ok(Response::new(())))
    }

    #[tokio::test]
    async fn records_metrics_for_request() {
        let registry = metric::Registry::new();
        let layer = TraceLayer::new(&registry, None);
        let mut service = layer.layer(service_fn(ok_service));
        let request = Request::builder().uri("/query").body(()).unwrap();
        let response = service.call(request).await.unwrap();
        assert_eq!(response.status().as_u16(), 200);
        let text = registry.prometheus_text();
        assert!(text.contains("http_requests_total"));
    }
}
