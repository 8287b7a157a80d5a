//! Configuration loading and validation.
//!
//! - [`settings`] - the [`GatewayConfig`](settings::GatewayConfig) model and
//!   its file-system loader.
//! - [`validation`] - the extra security/operational checks run on top of
//!   `GatewayConfig::validate`.

pub mod settings;
pub mod validation;

pub use settings::{load_config, GatewayConfig};
pub use validation::{ApiValidation, ConfigValidator, ValidationResult};
