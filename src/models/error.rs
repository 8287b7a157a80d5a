//! The gateway's single error type.
//!
//! Every fallible public operation in this crate returns a `GatewayError`.
//! Pure configuration validation (no request in flight) instead returns
//! `Result<_, Vec<String>>` / `Result<_, String>`, matching how the
//! underlying config model reports its own problems.

use actix_web::{http::StatusCode, HttpResponse};
use serde_json::json;

/// Errors surfaced while assembling or running a gateway pipeline.
///
/// # Variants
///
/// Each variant corresponds to one of the error kinds from the design:
/// `ConfigError`, `LoaderError`, `StoreError`, `UpstreamError`, `AuthError`,
/// `ClientError`. The HTTP-facing `ResponseError` impl below maps each to
/// the status code the design specifies.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// Malformed or contradictory API/middleware configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A named plug-in (auth strategy, breaker handler, rate-limit keygen) was not found.
    #[error("loader error: no handler registered for {kind}/{name}")]
    Loader { kind: &'static str, name: String },

    /// The shared state store is unavailable. Callers on the hot path treat this
    /// as fail-open rather than propagating it to the client.
    #[error("state store unavailable: {0}")]
    Store(String),

    /// The circuit protecting this API path is open or half-open with a probe in flight.
    #[error("CircuitBreaker open")]
    CircuitOpen,

    /// The upstream call did not complete within the configured timeout.
    #[error("CircuitBreaker timeout")]
    CircuitTimeout,

    /// The upstream responded, but with a 5xx or a connection failure.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// An authentication strategy rejected the request.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// The rate limiter rejected the request.
    #[error("rate limit exceeded")]
    RateLimited,

    /// The request itself is malformed (bad method, missing route, etc).
    #[error("client error: {0}")]
    Client(String),

    /// No API configuration matches the request path.
    #[error("no route for path {path}")]
    RouteNotFound { path: String },

    /// The route matched but the request method isn't allowed.
    #[error("method {method} not allowed for {path}")]
    MethodNotAllowed { method: String, path: String },
}

impl actix_web::error::ResponseError for GatewayError {
    fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::CircuitTimeout => StatusCode::GATEWAY_TIMEOUT,
            GatewayError::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            GatewayError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            GatewayError::Auth(_) => StatusCode::UNAUTHORIZED,
            GatewayError::RouteNotFound { .. } => StatusCode::NOT_FOUND,
            GatewayError::Client(_) => StatusCode::BAD_REQUEST,
            GatewayError::Upstream(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Config(_) | GatewayError::Loader { .. } | GatewayError::Store(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    fn error_response(&self) -> HttpResponse {
        // The two bit-exact, plain-text responses the wire contract requires.
        match self {
            GatewayError::CircuitOpen => {
                return HttpResponse::build(self.status_code()).body("CircuitBreaker open");
            }
            GatewayError::CircuitTimeout => {
                return HttpResponse::build(self.status_code()).body("CircuitBreaker timeout");
            }
            GatewayError::RateLimited => {
                return HttpResponse::build(self.status_code())
                    .body("Too many requests, please try again later.");
            }
            _ => {}
        }

        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string(),
        }))
    }
}
