//! Configuration validation with detailed error reporting.
//!
//! Structured the way the teacher's validator is: a `ValidationResult`
//! accumulating errors/warnings/recommendations rather than failing on the
//! first problem, so a misconfigured gateway gets one complete report.

use crate::config::settings::GatewayConfig;
use log::{info, warn};

/// Result of configuration validation containing errors, warnings, and recommendations.
#[derive(Debug, Clone)]
pub struct ValidationResult {
    /// Whether the configuration is valid (no errors).
    pub is_valid: bool,
    /// Critical errors that prevent configuration use.
    pub errors: Vec<String>,
    /// Non-critical issues that should be addressed.
    pub warnings: Vec<String>,
    /// Suggestions for improving configuration.
    pub recommendations: Vec<String>,
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            is_valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
            recommendations: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: String) {
        self.is_valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }

    pub fn add_recommendation(&mut self, recommendation: String) {
        self.recommendations.push(recommendation);
    }
}

/// One api's independent validation outcome.
#[derive(Debug, Clone)]
pub struct ApiValidation {
    pub api: crate::models::api::ApiConfig,
    pub result: ValidationResult,
}

/// Validates a [`GatewayConfig`] beyond the structural checks `validate()`
/// already runs on it, adding security/operational warnings and
/// recommendations that don't prevent the gateway from starting.
///
/// Validation is per-api: a problem with one api's configuration never
/// makes another, unrelated api's [`ValidationResult`] invalid. Only
/// structural problems (malformed path/target, a bad group regex, or this
/// api's path colliding with another's) mark an api's own result invalid —
/// everything else (an unresolved `use`, an unknown group reference, more
/// than one default entry of a kind) is a recommendation-level warning
/// here, because it's handled gracefully — by skipping just that one stage
/// — when the api's pipeline is actually assembled.
pub struct ConfigValidator;

impl ConfigValidator {
    /// Validates every api independently. Server-side callers use this
    /// directly to decide, api by api, which ones are safe to mount.
    pub fn validate_apis(config: &GatewayConfig) -> Vec<ApiValidation> {
        let mut seen_paths = std::collections::HashSet::new();
        let mut duplicate_paths = std::collections::HashSet::new();
        for api in &config.apis {
            if !seen_paths.insert(api.path.as_str()) {
                duplicate_paths.insert(api.path.clone());
            }
        }

        config
            .apis
            .iter()
            .map(|api| {
                let mut result = ValidationResult::new();

                for error in api.validate() {
                    result.add_error(error);
                }
                if duplicate_paths.contains(&api.path) {
                    result.add_error(format!("duplicate api path: {}", api.path));
                }

                Self::check_api(api, &config.authentication, &mut result);

                ApiValidation {
                    api: api.clone(),
                    result,
                }
            })
            .collect()
    }

    /// Runs [`Self::validate_apis`] and folds every api's problems into one
    /// report. Useful for callers that want a single pass/fail verdict over
    /// the whole file (the CLI surface, tests) rather than a per-api
    /// accept/reject split — [`crate::server::GatewayServer::configure`]
    /// uses [`Self::validate_apis`] directly instead of this.
    pub fn validate_comprehensive(config: &GatewayConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.apis.is_empty() {
            result.add_warning("no apis configured, gateway will serve nothing".to_string());
        }

        for validation in Self::validate_apis(config) {
            if !validation.result.is_valid {
                result.is_valid = false;
            }
            result.errors.extend(validation.result.errors);
            result.warnings.extend(validation.result.warnings);
            result.recommendations.extend(validation.result.recommendations);
        }

        if result.is_valid {
            info!(
                "configuration validated successfully with {} warnings",
                result.warnings.len()
            );
        } else {
            warn!("configuration validation failed with {} errors", result.errors.len());
        }

        result
    }

    fn check_api(
        api: &crate::models::api::ApiConfig,
        authentication: &std::collections::HashMap<String, crate::models::auth_config::AuthenticationConfig>,
        result: &mut ValidationResult,
    ) {
        if api.proxy.target.starts_with("http://") {
            result.add_warning(format!(
                "api '{}' proxies to a plaintext target ({}); consider https upstream",
                api.path, api.proxy.target
            ));
        }

        if api.authentication.is_empty() {
            result.add_recommendation(format!(
                "api '{}' has no authentication configured",
                api.path
            ));
        }

        if api.circuit_breaker.is_empty() {
            result.add_recommendation(format!(
                "api '{}' has no circuit breaker configured; a stuck upstream will hang every request",
                api.path
            ));
        }

        if api.rate_limit.is_none() {
            result.add_recommendation(format!(
                "api '{}' has no rate limit configured",
                api.path
            ));
        }

        for entry in &api.authentication {
            if let Err(e) = entry.resolve(authentication) {
                result.add_warning(format!(
                    "api '{}': {e}; this authentication stage will be skipped",
                    api.path
                ));
            }
            if let Some(names) = &entry.group {
                let unknown = api.unknown_group_names(names);
                if !unknown.is_empty() {
                    result.add_warning(format!(
                        "api '{}' authentication entry references unknown group(s) {}; this stage will be skipped",
                        api.path,
                        unknown.join(", ")
                    ));
                }
            }
        }

        for entry in &api.circuit_breaker {
            if let Some(names) = &entry.group {
                let unknown = api.unknown_group_names(names);
                if !unknown.is_empty() {
                    result.add_warning(format!(
                        "api '{}' circuitBreaker entry references unknown group(s) {}; this stage will be skipped",
                        api.path,
                        unknown.join(", ")
                    ));
                }
            }
        }

        let (default_auth, default_breaker) = api.default_entry_counts();
        if default_auth > 1 {
            result.add_warning(format!(
                "api '{}' has {default_auth} default authentication entries; all authentication entries will be skipped",
                api.path
            ));
        }
        if default_breaker > 1 {
            result.add_warning(format!(
                "api '{}' has {default_breaker} default circuitBreaker entries; all circuitBreaker entries will be skipped",
                api.path
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::api::{ApiConfig, ProxyConfig};

    fn api(path: &str, target: &str) -> ApiConfig {
        ApiConfig {
            path: path.to_string(),
            proxy: ProxyConfig {
                path: path.to_string(),
                target: target.to_string(),
            },
            group: Vec::new(),
            authentication: Vec::new(),
            circuit_breaker: Vec::new(),
            rate_limit: None,
            request_log: false,
            stats: false,
        }
    }

    #[test]
    fn empty_gateway_is_valid_but_warns() {
        let config = GatewayConfig::default();
        let result = ConfigValidator::validate_comprehensive(&config);
        assert!(result.is_valid);
        assert!(!result.warnings.is_empty());
    }

    #[test]
    fn plaintext_upstream_is_a_warning_not_an_error() {
        let config = GatewayConfig {
            apis: vec![api("/orders", "http://backend:8080")],
            authentication: Default::default(),
        };
        let result = ConfigValidator::validate_comprehensive(&config);
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("plaintext")));
    }

    #[test]
    fn unknown_group_reference_is_a_warning_not_an_error() {
        let mut api = api("/orders", "https://backend:8080");
        api.authentication.push(crate::models::auth_config::AuthenticationConfig {
            strategy: Some(crate::models::auth_config::StrategyRef {
                name: "jwt".to_string(),
                options: serde_json::Value::Null,
            }),
            group: Some(vec!["ghost".to_string()]),
            use_ref: None,
        });
        let config = GatewayConfig {
            apis: vec![api],
            authentication: Default::default(),
        };
        let result = ConfigValidator::validate_comprehensive(&config);
        // An unknown group reference only disables that one stage when the
        // pipeline is assembled; it doesn't take the whole api down.
        assert!(result.is_valid);
        assert!(result.warnings.iter().any(|w| w.contains("unknown group")));
    }

    #[test]
    fn a_bad_api_does_not_invalidate_a_good_one() {
        let bad = api("", "https://backend:8080"); // empty path fails `ApiConfig::validate`
        let good = api("/orders", "https://backend:8080");
        let config = GatewayConfig {
            apis: vec![bad, good],
            authentication: Default::default(),
        };
        let validations = ConfigValidator::validate_apis(&config);
        assert!(!validations[0].result.is_valid);
        assert!(validations[1].result.is_valid);
    }
}
