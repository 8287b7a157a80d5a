//! Proxy (final pipeline stage): forwards an admitted request to its API's
//! upstream target and translates the response back into an actix-web
//! `HttpResponse`.
//!
//! Header conversion and the connection-pooled client are adapted from the
//! teacher's `services::http::RouteHandler`; route matching, retries, and
//! load balancing aren't reproduced here since spec-level request routing
//! is already resolved before this stage runs (see [`crate::pipeline`]) and
//! a single target per API, not a backend pool, is what the model supports.

use crate::models::error::GatewayError;
use crate::utils::path::{join_upstream_url, strip_mount};
use actix_web::{http::Method as ActixMethod, web, HttpRequest, HttpResponse};
use reqwest::{
    header::{HeaderMap as ReqwestHeaderMap, HeaderName, HeaderValue},
    Client, Method as ReqwestMethod,
};
use std::time::Duration;

const SKIP_REQUEST_HEADERS: &[&str] = &["host", "connection", "upgrade", "proxy-connection"];
const SKIP_RESPONSE_HEADERS: &[&str] = &["connection", "transfer-encoding"];

/// Forwards requests for one API to its configured upstream target.
#[derive(Clone)]
pub struct ProxyClient {
    client: Client,
    mount: String,
    target: String,
}

impl ProxyClient {
    pub fn new(mount: String, target: String) -> Self {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()
            .expect("failed to build the upstream HTTP client");

        Self { client, mount, target }
    }

    pub async fn forward(&self, req: HttpRequest, body: web::Bytes) -> Result<HttpResponse, GatewayError> {
        let remaining = strip_mount(req.path(), &self.mount);
        let path_and_query = match req.uri().query() {
            Some(q) => format!("{remaining}?{q}"),
            None => remaining.to_string(),
        };
        let target_url = join_upstream_url(&self.target, &path_and_query);

        let method = to_reqwest_method(req.method());
        let headers = to_reqwest_headers(req.headers());

        let response = self
            .client
            .request(method, &target_url)
            .headers(headers)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| GatewayError::Upstream(format!("{target_url}: {e}")))?;

        let status = response.status();
        let mut builder = HttpResponse::build(status);
        for (name, value) in response.headers() {
            if SKIP_RESPONSE_HEADERS.iter().any(|skip| name.as_str().eq_ignore_ascii_case(skip)) {
                continue;
            }
            if let Ok(value) = actix_web::http::header::HeaderValue::from_bytes(value.as_bytes()) {
                builder.insert_header((name.as_str(), value));
            }
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| GatewayError::Upstream(format!("{target_url}: {e}")))?;

        Ok(builder.body(bytes))
    }
}

fn to_reqwest_method(method: &ActixMethod) -> ReqwestMethod {
    match *method {
        ActixMethod::GET => ReqwestMethod::GET,
        ActixMethod::POST => ReqwestMethod::POST,
        ActixMethod::PUT => ReqwestMethod::PUT,
        ActixMethod::DELETE => ReqwestMethod::DELETE,
        ActixMethod::HEAD => ReqwestMethod::HEAD,
        ActixMethod::OPTIONS => ReqwestMethod::OPTIONS,
        ActixMethod::CONNECT => ReqwestMethod::CONNECT,
        ActixMethod::PATCH => ReqwestMethod::PATCH,
        ActixMethod::TRACE => ReqwestMethod::TRACE,
        _ => ReqwestMethod::GET,
    }
}

fn to_reqwest_headers(original: &actix_web::http::header::HeaderMap) -> ReqwestHeaderMap {
    let mut headers = ReqwestHeaderMap::with_capacity(original.len());
    for (name, value) in original {
        let name_str = name.as_str().to_lowercase();
        if SKIP_REQUEST_HEADERS.iter().any(|skip| name_str.starts_with(skip)) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_ref()),
            HeaderValue::from_bytes(value.as_bytes()),
        ) {
            headers.insert(name, value);
        }
    }
    headers.entry("user-agent").or_insert_with(|| HeaderValue::from_static("gatewright/0.1"));
    headers
}
