//! HTTP route handlers that aren't part of a per-API pipeline.
//!
//! - [`health`] - liveness/readiness endpoints for monitoring and Kubernetes probes
//!
//! Proxy routing itself is assembled dynamically per API by
//! [`crate::pipeline`], not declared as a static route module here.

pub mod health;
