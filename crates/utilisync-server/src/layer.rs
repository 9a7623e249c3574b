//! HTTP-level middleware around the API router.
//!
//! Unlike [`EndpointMiddleware`](crate::EndpointMiddleware), these see the raw
//! request before any route is matched and may answer it themselves.
//! Registration order is outermost first.
//!
//! # Example
//!
//! ```ignore
//! struct Timing;
//!
//! impl ServerMiddleware for Timing {
//!     fn name(&self) -> &'static str {
//!         "timing"
//!     }
//!
//!     fn process<'a>(&'a self, request: RouteRequest, next: Next<'a>) -> BoxFuture<'a, HttpResponse> {
//!         Box::pin(async move {
//!             let start = Instant::now();
//!             let response = next.run(request).await;
//!             tracing::debug!(took = ?start.elapsed(), "api request");
//!             response
//!         })
//!     }
//! }
//! ```

use bytes::Bytes;
use http::{header, HeaderValue, Response, StatusCode};
use http_body_util::Full;
use std::sync::Arc;
use tracing::debug;

use crate::encode::HttpResponse;
use crate::handler::{BoxFuture, RouteRequest};

/// Middleware applied to every request under the API prefix.
pub trait ServerMiddleware: Send + Sync + 'static {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Handles `request`, usually by calling `next.run` exactly once.
    fn process<'a>(&'a self, request: RouteRequest, next: Next<'a>) -> BoxFuture<'a, HttpResponse>;
}

/// The rest of the chain.
pub struct Next<'a> {
    inner: NextInner<'a>,
}

enum NextInner<'a> {
    Chain {
        middleware: &'a dyn ServerMiddleware,
        next: Box<Next<'a>>,
    },
    Router(Box<dyn FnOnce(RouteRequest) -> BoxFuture<'a, HttpResponse> + Send + 'a>),
}

impl<'a> Next<'a> {
    /// Builds the chain over `middleware`, ending in `router`.
    pub(crate) fn chain<F>(middleware: &'a [Arc<dyn ServerMiddleware>], router: F) -> Self
    where
        F: FnOnce(RouteRequest) -> BoxFuture<'a, HttpResponse> + Send + 'a,
    {
        let mut next = Self {
            inner: NextInner::Router(Box::new(router)),
        };
        for layer in middleware.iter().rev() {
            next = Self {
                inner: NextInner::Chain {
                    middleware: layer.as_ref(),
                    next: Box::new(next),
                },
            };
        }
        next
    }

    /// Runs the next middleware, or the router at the end of the chain.
    pub async fn run(self, request: RouteRequest) -> HttpResponse {
        match self.inner {
            NextInner::Chain { middleware, next } => {
                debug!(middleware = middleware.name(), "entering server middleware");
                middleware.process(request, *next).await
            }
            NextInner::Router(router) => router(request).await,
        }
    }
}

/// Header set by the TLS-terminating proxy.
pub const FORWARDED_PROTO: &str = "x-forwarded-proto";

const HTTPS_ONLY_BODY: &str = "HTTP requests are not allowed for this service";

/// Rejects requests that did not arrive over HTTPS at the proxy.
#[derive(Debug, Clone, Copy, Default)]
pub struct HttpsOnly;

impl HttpsOnly {
    fn upgrade_required() -> HttpResponse {
        Response::builder()
            .status(StatusCode::UPGRADE_REQUIRED)
            .header(header::UPGRADE, HeaderValue::from_static("TLS/1.3, HTTP/1.1"))
            .header(header::CONNECTION, HeaderValue::from_static("Upgrade"))
            .body(Full::new(Bytes::from_static(HTTPS_ONLY_BODY.as_bytes())))
            .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
    }
}

impl ServerMiddleware for HttpsOnly {
    fn name(&self) -> &'static str {
        "https-only"
    }

    fn process<'a>(&'a self, request: RouteRequest, next: Next<'a>) -> BoxFuture<'a, HttpResponse> {
        Box::pin(async move {
            let https = request
                .headers()
                .get(FORWARDED_PROTO)
                .is_some_and(|proto| proto.as_bytes() == b"https");
            if !https {
                debug!(path = request.uri().path(), "rejecting plain http request");
                return Self::upgrade_required();
            }
            next.run(request).await
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;
    use parking_lot::Mutex;

    struct Record {
        name: &'static str,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl ServerMiddleware for Record {
        fn name(&self) -> &'static str {
            self.name
        }

        fn process<'a>(&'a self, request: RouteRequest, next: Next<'a>) -> BoxFuture<'a, HttpResponse> {
            Box::pin(async move {
                self.log.lock().push(self.name);
                next.run(request).await
            })
        }
    }

    fn request(proto: Option<&str>) -> RouteRequest {
        let mut builder = http::Request::builder().uri("/api/users/get");
        if let Some(proto) = proto {
            builder = builder.header(FORWARDED_PROTO, proto);
        }
        builder.body(Bytes::new()).unwrap()
    }

    fn ok_router<'a>() -> impl FnOnce(RouteRequest) -> BoxFuture<'a, HttpResponse> + Send + 'a {
        |_req: RouteRequest| -> BoxFuture<'a, HttpResponse> {
            Box::pin(async { crate::encode::empty_response(StatusCode::OK) })
        }
    }

    #[tokio::test]
    async fn test_registration_order_is_outermost_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let middleware: Vec<Arc<dyn ServerMiddleware>> = vec![
            Arc::new(Record {
                name: "first",
                log: log.clone(),
            }),
            Arc::new(Record {
                name: "second",
                log: log.clone(),
            }),
        ];

        let response = Next::chain(&middleware, ok_router()).run(request(None)).await;
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_https_only_rejects_plain_http() {
        let middleware: Vec<Arc<dyn ServerMiddleware>> = vec![Arc::new(HttpsOnly)];

        let response = Next::chain(&middleware, ok_router())
            .run(request(Some("http")))
            .await;
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
        assert_eq!(
            response.headers().get(header::UPGRADE).unwrap(),
            "TLS/1.3, HTTP/1.1"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], HTTPS_ONLY_BODY.as_bytes());

        let response = Next::chain(&middleware, ok_router()).run(request(None)).await;
        assert_eq!(response.status(), StatusCode::UPGRADE_REQUIRED);
    }

    #[tokio::test]
    async fn test_https_only_passes_https() {
        let middleware: Vec<Arc<dyn ServerMiddleware>> = vec![Arc::new(HttpsOnly)];
        let response = Next::chain(&middleware, ok_router())
            .run(request(Some("https")))
            .await;
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_empty_chain_reaches_router() {
        let response = Next::chain(&[], ok_router()).run(request(None)).await;
        assert_eq!(response.status(), StatusCode::OK);
    }
}
