//! Pipeline assembler (C6): turns one [`ApiConfig`] into an actix-web scope
//! mounting, in order: request logging, circuit-breaker stages,
//! authentication stages, the default rate limiter, and finally the proxy.
//!
//! Breaker and authentication stages are both `Vec<_>` per API (one entry
//! per group, plus an optional default), which doesn't fit actix-web's
//! `.wrap()` chain directly — that wants a fixed, compile-time sequence of
//! middleware types. [`PipelineStage`] instead folds the whole list into one
//! `Transform`/`Service`, evaluating each entry's group filter against the
//! live request and running whichever ones match, in declaration order.
//! Request logging and the rate limiter, being at most one per API, are
//! mounted as ordinary `.wrap()` layers around it.

use crate::auth::AuthStrategy;
use crate::breaker::{Admission, CircuitBreaker};
use crate::groups::{build_allow_filter, GroupFilter};
use crate::logs::request_log::AuthOutcome;
use crate::models::api::ApiConfig;
use crate::models::error::GatewayError;
use actix_web::{
    body::EitherBody,
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    error::ResponseError,
    web, Error as ActixError,
};
use futures::future::{LocalBoxFuture, Ready};
use log::error;
use serde_json::Value;
use std::sync::Arc;
use std::task::{Context, Poll};

struct BreakerEntry {
    filter: Option<GroupFilter>,
    breaker: Arc<CircuitBreaker>,
}

struct AuthEntry {
    filter: Option<GroupFilter>,
    strategy: Arc<dyn AuthStrategy>,
    options: Value,
}

/// The resolved, ready-to-mount shape of one API's middleware stages.
/// Built once at configure time by [`PipelineBuilder`], shared read-only by
/// every worker thread serving that API.
pub struct PipelineSpec {
    breakers: Vec<BreakerEntry>,
    auths: Vec<AuthEntry>,
}

/// Resolves an [`ApiConfig`]'s groups, breaker configs, and authentication
/// configs into a [`PipelineSpec`], looking up named strategies in the
/// plug-in registry (C2) and sharing one [`CircuitBreaker`] per API path.
pub struct PipelineBuilder<'a> {
    pub api: &'a ApiConfig,
    pub auth_dictionary: &'a std::collections::HashMap<String, crate::models::auth_config::AuthenticationConfig>,
    pub breaker_for_path: &'a dyn Fn(&str) -> Arc<CircuitBreaker>,
    pub load_auth_strategy: &'a dyn Fn(&str) -> Result<Arc<dyn AuthStrategy>, GatewayError>,
}

impl<'a> PipelineBuilder<'a> {
    /// Assembles this api's [`PipelineSpec`]. Infallible: a problem with one
    /// breaker or authentication entry is logged and that entry is simply
    /// left out, it never takes the rest of the api's pipeline down with it.
    pub fn build(&self) -> PipelineSpec {
        PipelineSpec {
            breakers: self.build_breaker_entries(),
            auths: self.build_auth_entries(),
        }
    }

    fn build_breaker_entries(&self) -> Vec<BreakerEntry> {
        if self.api.circuit_breaker.is_empty() {
            return Vec::new();
        }
        let breaker = (self.breaker_for_path)(&self.api.path);
        let sorted = crate::models::breaker_config::CircuitBreakerConfig::sort_default_last(
            self.api.circuit_breaker.clone(),
        );

        sorted
            .into_iter()
            .filter_map(|entry| {
                match build_allow_filter(&self.api.group, entry.group.as_deref()) {
                    Ok(filter) => Some(BreakerEntry {
                        filter,
                        breaker: breaker.clone(),
                    }),
                    Err(e) => {
                        error!(
                            "api '{}': {e}; skipping this circuitBreaker entry",
                            self.api.path
                        );
                        None
                    }
                }
            })
            .collect()
    }

    fn build_auth_entries(&self) -> Vec<AuthEntry> {
        if self.api.authentication.is_empty() {
            return Vec::new();
        }
        let sorted = crate::models::auth_config::AuthenticationConfig::sort_default_last(
            self.api.authentication.clone(),
        );

        sorted
            .iter()
            .filter_map(|entry| {
                let resolved = match entry.resolve(self.auth_dictionary) {
                    Ok(resolved) => resolved,
                    Err(e) => {
                        error!("api '{}': {e}; skipping this authentication entry", self.api.path);
                        return None;
                    }
                };
                let strategy_ref = match resolved.strategy.as_ref() {
                    Some(strategy_ref) => strategy_ref,
                    None => {
                        error!(
                            "api '{}': authentication entry missing a strategy; skipping it",
                            self.api.path
                        );
                        return None;
                    }
                };
                let strategy = match (self.load_auth_strategy)(&strategy_ref.name) {
                    Ok(strategy) => strategy,
                    Err(e) => {
                        error!(
                            "api '{}': {e}; skipping this authentication entry",
                            self.api.path
                        );
                        return None;
                    }
                };
                let filter = match build_allow_filter(&self.api.group, resolved.group.as_deref()) {
                    Ok(filter) => filter,
                    Err(e) => {
                        error!(
                            "api '{}': {e}; skipping this authentication entry",
                            self.api.path
                        );
                        return None;
                    }
                };
                Some(AuthEntry {
                    filter,
                    strategy,
                    options: strategy_ref.options.clone(),
                })
            })
            .collect()
    }
}

/// The actix-web `Transform` mounting a [`PipelineSpec`].
#[derive(Clone)]
pub struct PipelineStage {
    spec: Arc<PipelineSpec>,
}

impl PipelineStage {
    pub fn new(spec: Arc<PipelineSpec>) -> Self {
        Self { spec }
    }
}

impl<S, B> Transform<S, ServiceRequest> for PipelineStage
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Transform = PipelineMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        futures::future::ready(Ok(PipelineMiddleware {
            service: Arc::new(service),
            spec: self.spec.clone(),
        }))
    }
}

pub struct PipelineMiddleware<S> {
    service: Arc<S>,
    spec: Arc<PipelineSpec>,
}

impl<S, B> Service<ServiceRequest> for PipelineMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<EitherBody<B>>;
    type Error = ActixError;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.service.poll_ready(cx)
    }

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        let service = self.service.clone();
        let spec = self.spec.clone();

        Box::pin(async move {
            let http_req = req.request().clone();

            let mut admitted_breakers = Vec::new();
            for entry in &spec.breakers {
                let applies = entry
                    .filter
                    .as_ref()
                    .map(|f| f.matches_service_request(&req))
                    .unwrap_or(true);
                if !applies {
                    continue;
                }
                match entry.breaker.admit().await {
                    Admission::Allowed => admitted_breakers.push(entry.breaker.clone()),
                    Admission::Rejected => {
                        return Ok(ServiceResponse::new(http_req, GatewayError::CircuitOpen.error_response())
                            .map_into_right_body());
                    }
                }
            }

            let mut authenticated = false;
            for entry in &spec.auths {
                let applies = entry
                    .filter
                    .as_ref()
                    .map(|f| f.matches_service_request(&req))
                    .unwrap_or(true);
                if !applies {
                    continue;
                }
                if let Err(err) = entry.strategy.authenticate(&mut req, &entry.options).await {
                    req.extensions_mut().insert(AuthOutcome::Fail);
                    for breaker in &admitted_breakers {
                        breaker.record_failure().await;
                    }
                    return Ok(ServiceResponse::new(http_req, err.error_response()).map_into_right_body());
                }
                authenticated = true;
            }
            if authenticated {
                req.extensions_mut().insert(AuthOutcome::Success);
            }

            let call_timeout = admitted_breakers.iter().map(|b| b.call_timeout).min();

            let outcome = match call_timeout {
                Some(timeout) => match tokio::time::timeout(timeout, service.call(req)).await {
                    Ok(result) => result,
                    Err(_) => {
                        for breaker in &admitted_breakers {
                            breaker.record_failure().await;
                        }
                        return Ok(
                            ServiceResponse::new(http_req, GatewayError::CircuitTimeout.error_response())
                                .map_into_right_body(),
                        );
                    }
                },
                None => service.call(req).await,
            };

            match outcome {
                Ok(response) => {
                    let is_failure = response.status().is_server_error();
                    for breaker in &admitted_breakers {
                        if is_failure {
                            breaker.record_failure().await;
                        } else {
                            breaker.record_success().await;
                        }
                    }
                    Ok(response.map_into_left_body())
                }
                Err(e) => {
                    for breaker in &admitted_breakers {
                        breaker.record_failure().await;
                    }
                    Err(e)
                }
            }
        })
    }
}

/// Mounts `api` as a scope under `cfg`, wiring up its proxy handler behind
/// the rate limiter (innermost), the breaker/auth pipeline, and request
/// logging (outermost).
pub fn configure_api(
    cfg: &mut web::ServiceConfig,
    api: &ApiConfig,
    spec: Arc<PipelineSpec>,
    proxy: crate::proxy::ProxyClient,
) {
    use actix_web::HttpRequest;

    let proxy = Arc::new(proxy);
    let forward = move |req: HttpRequest, body: web::Bytes| {
        let proxy = proxy.clone();
        async move {
            proxy
                .forward(req, body)
                .await
                .map_err(actix_web::Error::from)
        }
    };

    // `.wrap()` layers stack outer-to-inner in the reverse of call order, so
    // request logging (added last, outermost) sees the pipeline's final
    // response, and the rate limiter (added first, nearest the handler) runs
    // after the breaker/auth pipeline.
    match (&api.rate_limit, api.request_log) {
        (Some(rate_limit_config), true) => {
            let scope = web::scope(&api.path)
                .wrap(crate::ratelimit::FixedWindowRateLimit::new(rate_limit_config.clone()))
                .wrap(PipelineStage::new(spec))
                .wrap(crate::logs::RequestLog);
            cfg.service(scope.default_service(web::route().to(forward)));
        }
        (Some(rate_limit_config), false) => {
            let scope = web::scope(&api.path)
                .wrap(crate::ratelimit::FixedWindowRateLimit::new(rate_limit_config.clone()))
                .wrap(PipelineStage::new(spec));
            cfg.service(scope.default_service(web::route().to(forward)));
        }
        (None, true) => {
            let scope = web::scope(&api.path)
                .wrap(PipelineStage::new(spec))
                .wrap(crate::logs::RequestLog);
            cfg.service(scope.default_service(web::route().to(forward)));
        }
        (None, false) => {
            let scope = web::scope(&api.path).wrap(PipelineStage::new(spec));
            cfg.service(scope.default_service(web::route().to(forward)));
        }
    }
}
