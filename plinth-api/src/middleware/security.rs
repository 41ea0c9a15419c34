/// Security headers middleware
///
/// Stamps a fixed set of browser hardening headers onto every response.
/// The API serves JSON and user-uploaded files, so the policy is strict:
/// no framing, no sniffing, nothing loaded from anywhere but self. HSTS
/// is gated on a flag because it must only be sent when the deployment
/// actually terminates TLS.
///
/// # Example
///
/// ```no_run
/// use axum::Router;
/// use plinth_api::middleware::security::SecurityHeadersLayer;
///
/// let app: Router = Router::new()
///     .layer(SecurityHeadersLayer::new(true)); // true = HSTS on
/// ```

use axum::{extract::Request, http::HeaderValue, response::Response};
use std::task::{Context, Poll};
use tower::{Layer, Service};

const CSP: &str = "default-src 'self'; script-src 'self'; style-src 'self' 'unsafe-inline'; \
     img-src 'self' data:; font-src 'self'; connect-src 'self'; frame-ancestors 'none'";

const PERMISSIONS: &str = "geolocation=(), microphone=(), camera=(), payment=(), usb=()";

const HSTS: &str = "max-age=31536000; includeSubDomains; preload";

/// Writes the hardening headers into a response header map
fn stamp_headers(headers: &mut axum::http::HeaderMap, enable_hsts: bool) {
    headers.insert("X-Content-Type-Options", HeaderValue::from_static("nosniff"));
    headers.insert("X-Frame-Options", HeaderValue::from_static("DENY"));
    headers.insert(
        "X-XSS-Protection",
        HeaderValue::from_static("1; mode=block"),
    );
    headers.insert(
        "Referrer-Policy",
        HeaderValue::from_static("strict-origin-when-cross-origin"),
    );
    headers.insert("Permissions-Policy", HeaderValue::from_static(PERMISSIONS));
    headers.insert("Content-Security-Policy", HeaderValue::from_static(CSP));

    if enable_hsts {
        headers.insert("Strict-Transport-Security", HeaderValue::from_static(HSTS));
    }
}

/// Layer that wraps services in [`SecurityHeaders`]
#[derive(Debug, Clone, Copy)]
pub struct SecurityHeadersLayer {
    enable_hsts: bool,
}

impl SecurityHeadersLayer {
    /// `enable_hsts` should only be true behind TLS
    pub fn new(enable_hsts: bool) -> Self {
        Self { enable_hsts }
    }
}

impl<S> Layer<S> for SecurityHeadersLayer {
    type Service = SecurityHeaders<S>;

    fn layer(&self, inner: S) -> Self::Service {
        SecurityHeaders {
            inner,
            enable_hsts: self.enable_hsts,
        }
    }
}

/// Service that stamps hardening headers on every response
#[derive(Debug, Clone)]
pub struct SecurityHeaders<S> {
    inner: S,
    enable_hsts: bool,
}

impl<S> Service<Request> for SecurityHeaders<S>
where
    S: Service<Request, Response = Response> + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: Request) -> Self::Future {
        let enable_hsts = self.enable_hsts;
        let future = self.inner.call(request);

        Box::pin(async move {
            let mut response = future.await?;
            stamp_headers(response.headers_mut(), enable_hsts);
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, routing::get, Router};
    use tower::Service as _;

    async fn respond(layer: SecurityHeadersLayer) -> Response {
        let mut app = Router::new()
            .route("/", get(|| async { "ok" }))
            .layer(layer);

        app.call(Request::builder().uri("/").body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hardening_headers_present() {
        let response = respond(SecurityHeadersLayer::new(false)).await;
        let headers = response.headers();

        assert_eq!(headers.get("X-Content-Type-Options").unwrap(), "nosniff");
        assert_eq!(headers.get("X-Frame-Options").unwrap(), "DENY");
        assert_eq!(
            headers.get("Referrer-Policy").unwrap(),
            "strict-origin-when-cross-origin"
        );
        assert_eq!(headers.get("Content-Security-Policy").unwrap(), CSP);
        assert_eq!(headers.get("Permissions-Policy").unwrap(), PERMISSIONS);
    }

    #[tokio::test]
    async fn test_hsts_follows_flag() {
        let with = respond(SecurityHeadersLayer::new(true)).await;
        assert_eq!(with.headers().get("Strict-Transport-Security").unwrap(), HSTS);

        let without = respond(SecurityHeadersLayer::new(false)).await;
        assert!(without.headers().get("Strict-Transport-Security").is_none());
    }
}
