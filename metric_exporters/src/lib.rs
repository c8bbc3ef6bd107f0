//! Serves a [`metric::Registry`]'s Prometheus text exposition over HTTP,
//! the same shape every IOx service binary exposes at `/metrics`.
#![deny(rustdoc::broken_intra_doc_links, rust_2018_idioms)]
#![warn(missing_debug_implementations, clippy::use_self)]

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Request, Response, Server};
use observability_deps::tracing::info;

/// Binds `addr` and serves `GET /metrics` with `registry`'s Prometheus
/// text. Runs until the returned future is dropped or awaited to
/// completion (it never completes on its own).
pub async fn serve(addr: SocketAddr, registry: Arc<metric::Registry>) -> hyper::Result<()> {
    let make_svc = make_service_fn(move |_conn| {
        let registry = Arc::clone(&registry);
        async move {
            Ok::<_, Infallible>(service_fn(move |req| {
                let registry = Arc::clone(&registry);
                async move { Ok::<_, Infallible>(handle(&registry, req)) }
            }))
        }
    });

    info!(%addr, "serving prometheus metrics");
    Server::bind(&addr).serve(make_svc).await
}

fn handle(registry: &metric::Registry, req: Request<Body>) -> Response<Body> {
    if req.uri().path() != "/metrics" {
        return Response::builder().status(404).body(Body::empty()).unwrap();
    }
    Response::builder()
        .status(200)
        .header("content-type", "text/plain; version=0.0.4")
        .body(Body::from(registry.prometheus_text()))
        .unwrap()
}

#[cfg(test)]
mod tests {
    use super::*;
    use metric::U64Counter;

    #[test]
    fn unknown_path_is_404() {
        let registry = metric::Registry::new();
        let req = Request::builder().uri("/other").body(Body::empty()).unwrap();
        let resp = handle(&registry, req);
        assert_eq!(resp.status(), 404);
    }

    #[tokio::test]
    async fn metrics_path_renders_registered_counters() {
        let registry = metric::Registry::new();
        let counter: Arc<metric::Metric<U64Counter>> =
            registry.register_counter("queries_admitted_total", "total queries admitted");
        counter.recorder(vec![]).inc();

        let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
        let resp = handle(&registry, req);
        assert_eq!(resp.status(), 200);
        let body = hyper::body::to_bytes(resp.into_body()).await.unwrap();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert!(text.contains("queries_admitted_total"));
    }
}
