//! Per-request summary logging, mounted as the outermost stage of an API's
//! pipeline when its `requestLog` flag is set.
//!
//! Unlike [`crate::pipeline::PipelineMiddleware`] this stage never rejects a
//! request; it only observes the response actix-web already produced, so it
//! needs neither `EitherBody` nor a group filter.

use actix_web::{
    dev::{Service, ServiceRequest, ServiceResponse, Transform},
    Error as ActixError,
};
use futures::future::{LocalBoxFuture, Ready};
use log::info;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

/// Stamped onto the request's extensions by
/// [`crate::pipeline::PipelineMiddleware::call`] once an authentication
/// stage has run, so [`RequestLogMiddleware`] can report the outcome without
/// re-running or even knowing about the authentication strategy involved.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Fail,
}

impl AuthOutcome {
    fn as_str(self) -> &'static str {
        match self {
            AuthOutcome::Success => "success",
            AuthOutcome::Fail => "fail",
        }
    }
}

#[derive(Clone, Default)]
pub struct RequestLog;

impl<S, B> Transform<S, ServiceRequest> for RequestLog
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = ActixError> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = ActixError;
    type Transform = RequestLogMiddleware<S>;
    type InitError = ();
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        futures::future::ready(Ok(RequestLogMiddleware {
            service: Arc::new(service),
        }))
    }
}

pub struct RequestLogMiddleware<S> {
    service: Arc<S>,
}

impl<S, B> Service<ServiceRequest> for RequestLogMiddleware<S>
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
        let method = req.method().to_string();
        let path = req.path().to_string();
        let peer = req.connection_info().peer_addr().unwrap_or("unknown").to_string();
        let started = Instant::now();

        Box::pin(async move {
            let response = service.call(req).await?;
            let elapsed = started.elapsed();
            let status = response.status().as_u16();
            let millis = elapsed.as_millis();
            match response.request().extensions().get::<AuthOutcome>() {
                Some(outcome) => info!(
                    "{peer} \"{method} {path}\" {status} {millis}ms authentication={}",
                    outcome.as_str()
                ),
                None => info!("{peer} \"{method} {path}\" {status} {millis}ms"),
            }
            Ok(response)
        })
    }
}
