//! Access log for every API call.
//!
//! Only request metadata is recorded. Bodies are never logged: the
//! connection test carries a Rally API key in its body.

use std::future::{Ready, ready};
use std::time::{Duration, Instant};

use actix_web::Error;
use actix_web::dev::{Service, ServiceRequest, ServiceResponse, Transform, forward_ready};
use actix_web::http::StatusCode;
use futures_util::future::LocalBoxFuture;
use tracing::{error, info, warn};

/// Successful requests slower than this are logged at WARN.
const SLOW_REQUEST: Duration = Duration::from_secs(10);

/// How a finished request is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Completed,
    Slow,
    ClientError,
    ServerError,
}

impl Outcome {
    fn classify(status: StatusCode, elapsed: Duration) -> Self {
        if status.is_server_error() {
            Outcome::ServerError
        } else if status.is_client_error() {
            Outcome::ClientError
        } else if elapsed >= SLOW_REQUEST {
            Outcome::Slow
        } else {
            Outcome::Completed
        }
    }
}

/// Request metadata captured before the handler consumes the request.
struct RequestLine {
    method: String,
    path: String,
    started: Instant,
}

impl RequestLine {
    fn capture(req: &ServiceRequest) -> Self {
        let header = |name: &str, fallback: &'static str| {
            req.headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .unwrap_or(fallback)
                .to_string()
        };
        let line = RequestLine {
            method: req.method().to_string(),
            path: req.path().to_string(),
            started: Instant::now(),
        };

        info!(
            target: "api",
            method = %line.method,
            path = %line.path,
            query = %req.query_string(),
            remote_addr = %req.connection_info().realip_remote_addr().unwrap_or("unknown"),
            user_agent = %header("user-agent", "unknown"),
            content_length = %header("content-length", "0"),
            "→ Request started"
        );
        line
    }

    fn finish(&self, status: StatusCode) {
        let elapsed = self.started.elapsed();
        let outcome = Outcome::classify(status, elapsed);
        let (method, path) = (&self.method, &self.path);
        let status = status.as_u16();
        let duration_ms = elapsed.as_millis() as u64;

        match outcome {
            Outcome::Completed => {
                info!(target: "api", %method, %path, status, duration_ms, "← Request completed")
            }
            Outcome::Slow => {
                warn!(target: "api", %method, %path, status, duration_ms, "← Slow request")
            }
            Outcome::ClientError => {
                warn!(target: "api", %method, %path, status, duration_ms, "← Client error")
            }
            Outcome::ServerError => {
                error!(target: "api", %method, %path, status, duration_ms, "← Server error")
            }
        }
    }
}

/// Middleware factory; wrap the app with `.wrap(RequestLogger)`.
pub struct RequestLogger;

impl<S, B> Transform<S, ServiceRequest> for RequestLogger
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestLoggerService<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestLoggerService { service }))
    }
}

pub struct RequestLoggerService<S> {
    service: S,
}

impl<S, B> Service<ServiceRequest> for RequestLoggerService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error>,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let line = RequestLine::capture(&req);
        let fut = self.service.call(req);

        Box::pin(async move {
            let res = fut.await?;
            line.finish(res.status());
            Ok(res)
        })
    }
}
