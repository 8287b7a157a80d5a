//! Authentication (C5): pluggable strategies resolved through the plug-in
//! registry (C2) and run by [`crate::pipeline::PipelineMiddleware`].
//!
//! - [`AuthStrategy`] — the trait every strategy implements.
//! - [`jwt`] — bearer JWT validation, adapted from the teacher's
//!   `middleware::auth` JWT implementation.
//! - [`key_auth`] — a static shared-secret header check, the simplest
//!   possible strategy, useful for service-to-service calls and tests.
//!
//! A request may carry more than one authentication entry (one per group,
//! plus an optional default), so strategies are run from
//! [`crate::pipeline::PipelineMiddleware::call`] directly rather than
//! through a standalone `Transform`/`Service` per entry.

pub mod jwt;
pub mod key_auth;

use crate::models::error::GatewayError;
use actix_web::dev::ServiceRequest;
use async_trait::async_trait;
use serde_json::Value;

/// One pluggable authentication check. Implementations inspect the request
/// (headers, query params, ...) and either let it through — optionally
/// attaching something to `req.extensions_mut()` for downstream stages to
/// read, the way [`jwt::JwtStrategy`] attaches [`jwt::Claims`] — or reject it
/// with [`GatewayError::Auth`].
#[async_trait(?Send)]
pub trait AuthStrategy: Send + Sync {
    async fn authenticate(&self, req: &mut ServiceRequest, options: &Value) -> Result<(), GatewayError>;
}
