//! The gateway server (C7): owns the current configuration, the plug-in
//! registries, and the shared state store, and turns them into a running
//! actix-web `HttpServer`.
//!
//! Grounded on `crates/kairos-gateway/src/main.rs`'s startup sequence
//! (configure logger, load settings, validate, build `HttpServer`,
//! `tokio::select!` against `signal::ctrl_c()` for graceful shutdown) but
//! repackaged as a reusable `GatewayServer` type rather than inline `main`
//! code, so `configure`/`start`/`stop` can be exercised independently in
//! tests.
//!
//! Reconfiguration replaces the whole routing table behind an `arc-swap`,
//! same technique the pack reaches for to publish new state without a lock
//! on the read path. `configure()` takes effect immediately for any worker
//! started after the call; workers already running pick it up the next time
//! the server is restarted, since actix builds one `App` per worker at bind
//! time rather than re-reading the table per request.

use crate::auth::AuthStrategy;
use crate::breaker::{CircuitBreaker, InMemoryStateStore, NotifyHook, StateStore};
use crate::config::settings::GatewayConfig;
use crate::config::validation::ConfigValidator;
use crate::models::error::GatewayError;
use crate::pipeline::{configure_api, PipelineBuilder};
use crate::proxy::ProxyClient;
use crate::registry::PluginRegistries;
use actix_web::{dev::ServerHandle, App, HttpServer};
use arc_swap::ArcSwap;
use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use tokio::signal;

/// Everything [`GatewayServer::start`] needs to build one worker's `App`.
struct RouteTable {
    config: GatewayConfig,
}

/// Owns the gateway's configuration and plug-in registries, and drives the
/// underlying HTTP server's lifecycle.
pub struct GatewayServer {
    table: Arc<ArcSwap<RouteTable>>,
    registries: Arc<PluginRegistries>,
    store: Arc<dyn StateStore>,
    configure_lock: Mutex<()>,
    handle: Mutex<Option<ServerHandle>>,
}

impl GatewayServer {
    /// Creates a server with an empty route table and the default in-memory
    /// state store. Call [`Self::configure`] before [`Self::start`].
    pub fn new(registries: PluginRegistries) -> Self {
        Self::with_store(registries, Arc::new(InMemoryStateStore::new()))
    }

    pub fn with_store(registries: PluginRegistries, store: Arc<dyn StateStore>) -> Self {
        Self {
            table: Arc::new(ArcSwap::from_pointee(RouteTable {
                config: GatewayConfig::default(),
            })),
            registries: Arc::new(registries),
            store,
            configure_lock: Mutex::new(()),
            handle: Mutex::new(None),
        }
    }

    /// Validates `config` api by api and atomically publishes a route table
    /// containing every api that passed. An api with a structural problem
    /// (bad path/target shape, a bad group regex, or a path colliding with
    /// another api's) is logged and left out; it never stops the rest of
    /// the config from being served. Calls are serialized so two concurrent
    /// `configure()` calls can't interleave their validation and publish
    /// steps.
    pub fn configure(&self, config: GatewayConfig) -> Result<(), GatewayError> {
        let _guard = self.configure_lock.lock().expect("configure lock poisoned");

        let validations = ConfigValidator::validate_apis(&config);
        let mut accepted = Vec::with_capacity(validations.len());
        for validation in validations {
            for warning in &validation.result.warnings {
                warn!("{warning}");
            }
            for recommendation in &validation.result.recommendations {
                info!("{recommendation}");
            }
            if validation.result.is_valid {
                accepted.push(validation.api);
            } else {
                for e in &validation.result.errors {
                    error!("api '{}' rejected: {e}", validation.api.path);
                }
            }
        }

        info!("publishing configuration with {} apis", accepted.len());
        self.table.store(Arc::new(RouteTable {
            config: GatewayConfig {
                apis: accepted,
                authentication: config.authentication,
            },
        }));
        Ok(())
    }

    /// Binds `addr` and serves until either the process receives Ctrl-C or
    /// [`Self::stop`] is called. Each worker gets its own `App` built from
    /// the route table snapshot current at bind time.
    pub async fn start(&self, addr: (&str, u16)) -> std::io::Result<()> {
        let table = self.table.load_full();
        let registries = self.registries.clone();
        let store = self.store.clone();

        let server = HttpServer::new(move || {
            let snapshot = table.load_full();
            let auth_dictionary = Arc::new(snapshot.config.authentication.clone());
            let mut app = App::new().configure(crate::routes::health::configure_health);
            for api in &snapshot.config.apis {
                let api = api.clone();
                let registries = registries.clone();
                let store = store.clone();
                let auth_dictionary = auth_dictionary.clone();
                let default_cfg = crate::models::breaker_config::CircuitBreakerConfig::default();
                let breaker_cfg = api_breaker_config(&api, &default_cfg).clone();
                let hooks = resolve_hooks(&registries, &breaker_cfg);

                app = app.configure(move |cfg| {
                    let breaker_for_path = {
                        let store = store.clone();
                        let path = api.path.clone();
                        let breaker_cfg = breaker_cfg.clone();
                        let hooks = hooks.clone();
                        move |_: &str| -> Arc<CircuitBreaker> {
                            Arc::new(CircuitBreaker::new(
                                path.clone(),
                                &breaker_cfg,
                                store.clone(),
                                hooks.0.clone(),
                                hooks.1.clone(),
                                hooks.2.clone(),
                            ))
                        }
                    };
                    let load_auth_strategy = {
                        let registries = registries.clone();
                        move |name: &str| -> Result<Arc<dyn AuthStrategy>, GatewayError> {
                            registries.load_auth(name)
                        }
                    };

                    let builder = PipelineBuilder {
                        api: &api,
                        auth_dictionary: &auth_dictionary,
                        breaker_for_path: &breaker_for_path,
                        load_auth_strategy: &load_auth_strategy,
                    };
                    let spec = builder.build();
                    let proxy = ProxyClient::new(api.proxy.path.clone(), api.proxy.target.clone());
                    configure_api(cfg, &api, Arc::new(spec), proxy);
                });
            }
            app
        })
        .bind(addr)?
        .run();

        let server_handle = server.handle();
        *self.handle.lock().expect("server handle lock poisoned") = Some(server_handle);

        info!("gateway listening on {}:{}", addr.0, addr.1);

        tokio::select! {
            result = server => {
                if let Err(e) = result {
                    error!("server error: {e}");
                }
            }
            _ = signal::ctrl_c() => {
                info!("received shutdown signal, stopping server");
            }
        }

        Ok(())
    }

    /// Triggers graceful shutdown of a running server, if one has been started.
    pub async fn stop(&self) {
        let handle = self.handle.lock().expect("server handle lock poisoned").clone();
        if let Some(handle) = handle {
            handle.stop(true).await;
        }
    }
}

/// Picks the breaker config that parameterizes an API's single shared
/// circuit breaker: the default (group-less) entry if one exists, else the
/// first declared entry. Every entry on the same path shares one breaker's
/// runtime state regardless of which config parameterized it (see
/// [`crate::models::breaker_config::CircuitBreakerConfig`]).
fn api_breaker_config<'a>(
    api: &'a crate::models::api::ApiConfig,
    fallback: &'a crate::models::breaker_config::CircuitBreakerConfig,
) -> &'a crate::models::breaker_config::CircuitBreakerConfig {
    api.circuit_breaker
        .iter()
        .find(|b| b.group.is_none())
        .or_else(|| api.circuit_breaker.first())
        .unwrap_or(fallback)
}

fn resolve_hooks(
    registries: &PluginRegistries,
    cfg: &crate::models::breaker_config::CircuitBreakerConfig,
) -> (Option<NotifyHook>, Option<NotifyHook>, Option<NotifyHook>) {
    let on_open = cfg.on_open.as_deref().and_then(|name| registries.load_notifier(name).ok());
    let on_close = cfg.on_close.as_deref().and_then(|name| registries.load_notifier(name).ok());
    let on_rejected = cfg.on_rejected.as_deref().and_then(|name| registries.load_notifier(name).ok());
    (on_open, on_close, on_rejected)
}
