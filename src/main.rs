//! Gateway server binary entry point.
//!
//! Grounded on `crates/kairos-gateway/src/main.rs`: configure the logger,
//! load and validate configuration, start the server, and shut down
//! gracefully on Ctrl-C (the last part lives in [`gatewright::server`] now).

use gatewright::auth::jwt::JwtStrategy;
use gatewright::auth::key_auth::KeyAuthStrategy;
use gatewright::config::load_config;
use gatewright::logs::logger::configure_logger;
use gatewright::registry::PluginRegistries;
use gatewright::server::GatewayServer;
use log::{error, info};
use std::sync::Arc;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    configure_logger();

    let mut registries = PluginRegistries::new();
    registries.auth.register("jwt", Arc::new(JwtStrategy));
    registries.auth.register("key", Arc::new(KeyAuthStrategy));

    let server = GatewayServer::new(registries);

    let config = match load_config() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = server.configure(config) {
        error!("configuration rejected: {e}");
        std::process::exit(1);
    }

    let host = std::env::var("GATEWAY_HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = std::env::var("GATEWAY_PORT")
        .unwrap_or_else(|_| "8080".to_string())
        .parse::<u16>()
        .unwrap_or(8080);

    info!("starting gatewright on {host}:{port}");
    server.start((host.as_str(), port)).await
}
