//! The per-API configuration model (§3 of the design).

use crate::models::auth_config::AuthenticationConfig;
use crate::models::breaker_config::CircuitBreakerConfig;
use crate::models::group::Group;
use crate::ratelimit::RateLimitConfig;
use serde::{Deserialize, Serialize};

/// Where a matched request is forwarded.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ProxyConfig {
    /// Local mount point under `ApiConfig::path` that is stripped before forwarding.
    /// Usually equal to `path`.
    pub path: String,
    /// Upstream base URL, including scheme and port, e.g. `http://backend:8080`.
    pub target: String,
}

/// The authoritative description of one upstream, matched by path prefix.
///
/// `authentication` and `circuit_breaker` are each meant to carry at most one
/// group-less (default) entry. Nothing enforces that at construction time —
/// the fields are plain `pub` data, deserialized straight off the
/// configuration file — so a config can arrive with two. That's caught
/// later, per list, by [`crate::models::auth_config::AuthenticationConfig::sort_default_last`]
/// and [`crate::models::breaker_config::CircuitBreakerConfig::sort_default_last`]
/// when the pipeline is assembled, which log the conflict and drop that
/// one stage kind's entries rather than rejecting the whole API.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct ApiConfig {
    /// URL prefix under which requests are matched. Unique per gateway.
    pub path: String,
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub group: Vec<Group>,
    #[serde(default)]
    pub authentication: Vec<AuthenticationConfig>,
    #[serde(default, rename = "circuitBreaker")]
    pub circuit_breaker: Vec<CircuitBreakerConfig>,
    #[serde(default, rename = "rateLimit")]
    pub rate_limit: Option<RateLimitConfig>,
    #[serde(default, rename = "requestLog")]
    pub request_log: bool,
    #[serde(default)]
    pub stats: bool,
}

impl ApiConfig {
    /// Validates path/target shape and group regexes, returning the list of
    /// structural problems found (empty means this api is safe to mount).
    /// The default-entry invariant isn't checked here — it's handled later,
    /// per stage kind, by [`AuthenticationConfig::sort_default_last`] and
    /// [`CircuitBreakerConfig::sort_default_last`] during pipeline assembly,
    /// since a conflict there costs that one stage kind, not the whole api.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !self.path.starts_with('/') {
            errors.push(format!("api path must start with '/': {}", self.path));
        }
        if !self.proxy.path.starts_with('/') {
            errors.push(format!(
                "proxy path must start with '/': {}",
                self.proxy.path
            ));
        }
        if self.proxy.target.is_empty() {
            errors.push("proxy target must not be empty".to_string());
        }

        for group in &self.group {
            if let Err(e) = group.validate() {
                errors.push(e);
            }
        }

        errors
    }

    /// Number of group-less (default) entries declared for `authentication`
    /// and `circuit_breaker`, for validators that want to warn about a
    /// conflict without treating it as fatal for the whole API — the
    /// pipeline builder already degrades gracefully for this case (see
    /// [`crate::models::auth_config::AuthenticationConfig::sort_default_last`]).
    pub fn default_entry_counts(&self) -> (usize, usize) {
        let auth = self.authentication.iter().filter(|a| a.group.is_none()).count();
        let breaker = self.circuit_breaker.iter().filter(|b| b.group.is_none()).count();
        (auth, breaker)
    }

    /// Names referenced by a middleware entry's `group` field that aren't
    /// declared on this API. Used by the validator for a helpful error
    /// rather than a silently-absent filter.
    pub fn unknown_group_names<'a>(&'a self, names: &'a [String]) -> Vec<&'a str> {
        names
            .iter()
            .filter(|n| !self.group.iter().any(|g| &g.name == *n))
            .map(|s| s.as_str())
            .collect()
    }
}
