//! # gatewright
//!
//! A declarative HTTP API gateway: each mounted API gets its own
//! group-scoped authentication, circuit breaking, rate limiting, and
//! upstream proxying, assembled from a single JSON configuration file.
//!
//! ## Quick start
//!
//! ```no_run
//! use gatewright::config::load_config;
//! use gatewright::registry::PluginRegistries;
//! use gatewright::server::GatewayServer;
//! use gatewright::auth::jwt::JwtStrategy;
//! use std::sync::Arc;
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     gatewright::logs::logger::configure_logger();
//!
//!     let mut registries = PluginRegistries::new();
//!     registries.auth.register("jwt", Arc::new(JwtStrategy));
//!
//!     let server = GatewayServer::new(registries);
//!     let config = load_config().expect("failed to load configuration");
//!     server.configure(config).expect("invalid configuration");
//!
//!     server.start(("0.0.0.0", 8080)).await
//! }
//! ```
//!
//! ## Module organization
//!
//! - [`config`] - loading and validating the gateway's configuration file.
//! - [`models`] - the per-API configuration model (routes, groups, auth and
//!   breaker entries) and the crate's single error type.
//! - [`groups`] - compiling named predicate groups into a per-request filter.
//! - [`registry`] - the kind-keyed plug-in registry authentication strategies
//!   and circuit-breaker notifiers are looked up through.
//! - [`auth`] - the authentication stage and its reference strategies.
//! - [`breaker`] - the shared state store and the circuit-breaker stage.
//! - [`ratelimit`] - the default fixed-window rate limiter.
//! - [`proxy`] - forwarding an admitted request to its upstream target.
//! - [`pipeline`] - assembling one API's stages into a mounted actix-web scope.
//! - [`server`] - owning configuration and registries and running the server.
//! - [`logs`] - startup logging configuration and the per-request log stage.
//! - [`routes`] - standalone HTTP routes outside any API's pipeline (health checks).
//! - [`middleware`] - kept as reference: a richer multi-strategy rate limiter.
//! - [`utils`] - small helpers shared across the request path.

pub mod auth;
pub mod breaker;
pub mod config;
pub mod groups;
pub mod logs;
pub mod middleware;
pub mod models;
pub mod pipeline;
pub mod proxy;
pub mod ratelimit;
pub mod registry;
pub mod routes;
pub mod server;
pub mod utils;
