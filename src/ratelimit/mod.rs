//! Default rate limiter (§10.4 of the design): a fixed-window limiter keyed
//! by client IP, mounted as the last stage before the proxy when an API
//! declares a `rateLimit` block.
//!
//! Modeled on [`crate::middleware::rate_limit::AdvancedRateLimit`], trimmed
//! to the one strategy/window combination the gateway actually needs:
//! per-IP, fixed window. The richer multi-strategy limiter stays in the tree
//! as reference for anyone wiring up `PerUser`/`PerRoute`/token-bucket
//! limiting later.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error as ActixError, HttpResponse,
};
use futures::future::{LocalBoxFuture, Ready};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::{Arc, RwLock},
    task::{Context, Poll},
    time::{Duration, Instant},
};

fn default_window_seconds() -> u64 {
    60
}

/// Rate limit configuration for one API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    #[serde(rename = "maxRequests")]
    pub max_requests: u64,
    #[serde(default = "default_window_seconds", rename = "windowSeconds")]
    pub window_seconds: u64,
}

struct WindowEntry {
    count: u64,
    window_start: Instant,
}

/// Shared fixed-window counters, one entry per client key.
struct FixedWindowStore {
    entries: RwLock<HashMap<String, WindowEntry>>,
}

impl FixedWindowStore {
    fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    fn check(&self, key: &str, config: &RateLimitConfig) -> bool {
        let window = Duration::from_secs(config.window_seconds);
        let now = Instant::now();
        let mut entries = self.entries.write().expect("rate limit store lock poisoned");
        let entry = entries.entry(key.to_string()).or_insert_with(|| WindowEntry {
            count: 0,
            window_start: now,
        });

        if now.duration_since(entry.window_start) >= window {
            entry.window_start = now;
            entry.count = 0;
        }

        if entry.count >= config.max_requests {
            return false;
        }
        entry.count += 1;
        true
    }
}

/// Middleware factory for [`FixedWindowRateLimitMiddleware`].
#[derive(Clone)]
pub struct FixedWindowRateLimit {
    config: RateLimitConfig,
    store: Arc<FixedWindowStore>,
}

impl FixedWindowRateLimit {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            store: Arc::new(FixedWindowStore::new()),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for FixedWindowRateLimit
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Transform = FixedWindowRateLimitMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        futures::future::ready(Ok(FixedWindowRateLimitMiddleware {
            service: Arc::new(service),
            config: self.config.clone(),
            store: self.store.clone(),
        }))
    }
}

pub struct FixedWindowRateLimitMiddleware<S> {
    service: Arc<S>,
    config: RateLimitConfig,
    store: Arc<FixedWindowStore>,
}

impl<S, B> Service<ServiceRequest> for FixedWindowRateLimitMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let config = self.config.clone();
        let store = self.store.clone();

        let key = req
            .connection_info()
            .peer_addr()
            .unwrap_or("unknown")
            .to_string();

        Box::pin(async move {
            if store.check(&key, &config) {
                service.call(req).await
            } else {
                log::debug!("rate limit exceeded for {key}");
                Ok(req.into_response(
                    HttpResponse::TooManyRequests()
                        .content_type("text/plain; charset=utf-8")
                        .body("Too many requests, please try again later."),
                ))
            }
        })
    }
}
