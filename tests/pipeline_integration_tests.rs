//! Integration tests for the pipeline assembler (C6): builds a
//! [`PipelineSpec`] from an [`ApiConfig`] and mounts it as actix-web
//! middleware in front of a plain handler, the same shape
//! `server::GatewayServer` assembles per API, minus the proxy call itself.

use gatewright::auth::key_auth::KeyAuthStrategy;
use gatewright::auth::AuthStrategy;
use gatewright::breaker::{CircuitBreaker, InMemoryStateStore};
use gatewright::models::api::{ApiConfig, ProxyConfig};
use gatewright::models::auth_config::{AuthenticationConfig, StrategyRef};
use gatewright::models::breaker_config::CircuitBreakerConfig;
use gatewright::models::error::GatewayError;
use gatewright::models::group::{Group, Predicate};
use gatewright::pipeline::{PipelineBuilder, PipelineStage};
use actix_web::{test, web, App, HttpResponse};
use std::collections::HashMap;
use std::sync::Arc;

fn bare_api(path: &str) -> ApiConfig {
    ApiConfig {
        path: path.to_string(),
        proxy: ProxyConfig {
            path: path.to_string(),
            target: "https://backend.internal".to_string(),
        },
        group: Vec::new(),
        authentication: Vec::new(),
        circuit_breaker: Vec::new(),
        rate_limit: None,
        request_log: false,
        stats: false,
    }
}

async fn ok_handler() -> HttpResponse {
    HttpResponse::Ok().finish()
}

async fn failing_handler() -> HttpResponse {
    HttpResponse::InternalServerError().finish()
}

fn build_stage(api: &ApiConfig) -> PipelineStage {
    let store = Arc::new(InMemoryStateStore::new());
    let auth_dictionary: HashMap<String, AuthenticationConfig> = HashMap::new();

    let breaker_for_path = {
        let store = store.clone();
        move |path: &str| -> Arc<CircuitBreaker> {
            Arc::new(CircuitBreaker::new(
                format!("{path}#default"),
                &CircuitBreakerConfig::default(),
                store.clone(),
                None,
                None,
                None,
            ))
        }
    };
    let load_auth_strategy = |name: &str| -> Result<Arc<dyn AuthStrategy>, GatewayError> {
        match name {
            "key" => Ok(Arc::new(KeyAuthStrategy)),
            other => Err(GatewayError::Loader { kind: "auth", name: other.to_string() }),
        }
    };

    let builder = PipelineBuilder {
        api,
        auth_dictionary: &auth_dictionary,
        breaker_for_path: &breaker_for_path,
        load_auth_strategy: &load_auth_strategy,
    };
    PipelineStage::new(Arc::new(builder.build()))
}

#[actix_web::test]
async fn api_with_no_stages_passes_every_request_through() {
    let api = bare_api("/orders");
    let app = test::init_service(
        App::new()
            .wrap(build_stage(&api))
            .route("/orders", web::get().to(ok_handler)),
    )
    .await;

    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn authentication_runs_before_reaching_the_handler() {
    let mut api = bare_api("/orders");
    api.authentication.push(AuthenticationConfig {
        strategy: Some(StrategyRef {
            name: "key".to_string(),
            options: serde_json::json!({"header": "x-api-key", "key": "secret"}),
        }),
        group: None,
        use_ref: None,
    });

    let app = test::init_service(
        App::new()
            .wrap(build_stage(&api))
            .route("/orders", web::get().to(ok_handler)),
    )
    .await;

    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    let req = test::TestRequest::get()
        .uri("/orders")
        .insert_header(("x-api-key", "secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
}

#[actix_web::test]
async fn group_scoped_authentication_only_applies_to_matching_requests() {
    let mut api = bare_api("/orders");
    api.group.push(Group {
        name: "writes".to_string(),
        predicates: vec![Predicate {
            method: Some("POST".to_string()),
            url: None,
        }],
    });
    api.authentication.push(AuthenticationConfig {
        strategy: Some(StrategyRef {
            name: "key".to_string(),
            options: serde_json::json!({"header": "x-api-key", "key": "secret"}),
        }),
        group: Some(vec!["writes".to_string()]),
        use_ref: None,
    });

    let app = test::init_service(
        App::new()
            .wrap(build_stage(&api))
            .route("/orders", web::get().to(ok_handler))
            .route("/orders", web::post().to(ok_handler)),
    )
    .await;

    // GET isn't in the "writes" group, so no key is required.
    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);

    // POST is, and requires the key.
    let req = test::TestRequest::post().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);
}

#[actix_web::test]
async fn breaker_opens_after_repeated_server_errors_and_stops_reaching_the_handler() {
    let mut api = bare_api("/orders");
    api.circuit_breaker.push(CircuitBreakerConfig {
        max_failures: 1,
        reset_timeout: 60_000,
        ..CircuitBreakerConfig::default()
    });

    let app = test::init_service(
        App::new()
            .wrap(build_stage(&api))
            .route("/orders", web::get().to(failing_handler)),
    )
    .await;

    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 500);

    // The breaker tripped on that 500; the next request is rejected before
    // the handler runs.
    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
}

#[actix_web::test]
async fn auth_failure_counts_as_a_breaker_failure() {
    let mut api = bare_api("/orders");
    api.circuit_breaker.push(CircuitBreakerConfig {
        max_failures: 1,
        reset_timeout: 60_000,
        ..CircuitBreakerConfig::default()
    });
    api.authentication.push(AuthenticationConfig {
        strategy: Some(StrategyRef {
            name: "key".to_string(),
            options: serde_json::json!({"header": "x-api-key", "key": "secret"}),
        }),
        group: None,
        use_ref: None,
    });

    let app = test::init_service(
        App::new()
            .wrap(build_stage(&api))
            .route("/orders", web::get().to(ok_handler)),
    )
    .await;

    // Unauthenticated request: rejected by auth, and the admitted breaker
    // is charged a failure for it.
    let req = test::TestRequest::get().uri("/orders").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 401);

    // The breaker is now open (max_failures == 1), so even a correctly
    // authenticated request is rejected before auth even runs.
    let req = test::TestRequest::get()
        .uri("/orders")
        .insert_header(("x-api-key", "secret"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 503);
}
