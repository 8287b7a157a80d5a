//! Logging: startup configuration plus the per-request summary stage.
//!
//! - [`logger`] - structured, colorized `env_logger` setup.
//! - [`request_log`] - the `requestLog` pipeline stage.

pub mod logger;
pub mod request_log;

pub use request_log::RequestLog;
