//! Circuit-breaker configuration: one entry per breaker stage an API wants.

use log::error;
use serde::{Deserialize, Serialize};

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_reset_timeout_ms() -> u64 {
    120_000
}

fn default_max_failures() -> u64 {
    10
}

/// One circuit-breaker stage for an API.
///
/// All breaker stages for the same API path share one runtime state (see
/// [`crate::breaker::CircuitBreaker`]) in the state store; only the group
/// filter and handler ids differ between stages on the same path.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct CircuitBreakerConfig {
    #[serde(default = "default_timeout_ms")]
    pub timeout: u64,
    #[serde(default = "default_reset_timeout_ms", rename = "resetTimeout")]
    pub reset_timeout: u64,
    #[serde(default = "default_max_failures", rename = "maxFailures")]
    pub max_failures: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
    #[serde(rename = "onOpen", default, skip_serializing_if = "Option::is_none")]
    pub on_open: Option<String>,
    #[serde(rename = "onClose", default, skip_serializing_if = "Option::is_none")]
    pub on_close: Option<String>,
    #[serde(
        rename = "onRejected",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub on_rejected: Option<String>,
    #[serde(rename = "disableStats", default)]
    pub disable_stats: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            timeout: default_timeout_ms(),
            reset_timeout: default_reset_timeout_ms(),
            max_failures: default_max_failures(),
            group: None,
            on_open: None,
            on_close: None,
            on_rejected: None,
            disable_stats: false,
        }
    }
}

impl CircuitBreakerConfig {
    /// Same default-last ordering rule as [`crate::models::auth_config::AuthenticationConfig`],
    /// applied to breaker configs instead.
    ///
    /// More than one default (group-less) entry is a contradiction (which one
    /// is "the" catch-all?), but it's a problem with this one stage kind, not
    /// the whole API: logs the conflict and drops every circuitBreaker entry
    /// for this API rather than guessing, leaving the rest of the pipeline
    /// (auth, rate limit, proxy) untouched.
    pub fn sort_default_last(mut entries: Vec<CircuitBreakerConfig>) -> Vec<CircuitBreakerConfig> {
        let default_count = entries.iter().filter(|e| e.group.is_none()).count();
        if default_count > 1 {
            error!(
                "at most one default (group-less) circuitBreaker entry is allowed, found {default_count}; dropping all circuitBreaker entries for this api"
            );
            return Vec::new();
        }
        entries.sort_by_key(|e| e.group.is_none());
        entries
    }
}
