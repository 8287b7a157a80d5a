//! Loading the gateway's top-level configuration file.
//!
//! Adapted from the teacher's `load_settings`: same environment variable
//! pattern, same path-traversal and size-limit checks, new JSON shape.

use crate::models::api::ApiConfig;
use crate::models::auth_config::AuthenticationConfig;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

const MAX_CONFIG_SIZE: u64 = 10 * 1024 * 1024;

/// The gateway's whole configuration: every mounted API plus the shared
/// authentication dictionary `use` references resolve against.
#[derive(Serialize, Deserialize, Debug, Clone, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub apis: Vec<ApiConfig>,
    /// Named authentication entries other entries can refer to via `use`.
    #[serde(default)]
    pub authentication: HashMap<String, AuthenticationConfig>,
}

impl GatewayConfig {
    /// Runs each API's own structural validation (path/target shape, group
    /// regexes) plus the one gateway-wide structural check, unique paths.
    /// These are the problems severe enough that an API carrying one can't
    /// be served at all; everything else (unresolved `use` references,
    /// unknown group references, duplicate default entries, unknown plug-in
    /// names) is a per-stage concern handled when that API's pipeline is
    /// assembled (see [`crate::pipeline::PipelineBuilder`]), not a reason to
    /// exclude the API outright.
    ///
    /// Returns every problem found, labeled by the api that has it; an
    /// empty vec means every api here is structurally safe to mount.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for api in &self.apis {
            errors.extend(api.validate());
        }

        let mut seen_paths = std::collections::HashSet::new();
        for api in &self.apis {
            if !seen_paths.insert(api.path.as_str()) {
                errors.push(format!("duplicate api path: {}", api.path));
            }
        }

        errors
    }
}

/// Loads and validates the gateway configuration from the file system.
///
/// The path is taken from `GATEWAY_CONFIG_PATH`, defaulting to
/// `./config.json`. The file must resolve inside the current working
/// directory and stay under 10MB, the same safeguards the teacher's loader
/// applies.
pub fn load_config() -> Result<GatewayConfig, Box<dyn std::error::Error>> {
    let config_path =
        std::env::var("GATEWAY_CONFIG_PATH").unwrap_or_else(|_| "./config.json".to_string());

    debug!("loading configuration from: {config_path}");

    let path = Path::new(&config_path);
    if !path.exists() {
        return Err(format!("cannot resolve config path '{config_path}'").into());
    }

    let canonical_path = path
        .canonicalize()
        .map_err(|e| format!("cannot resolve config path '{config_path}': {e}"))?;
    let current_dir =
        std::env::current_dir().map_err(|e| format!("cannot get current directory: {e}"))?;
    if !canonical_path.starts_with(&current_dir) {
        return Err("config path outside working directory".into());
    }

    let metadata = fs::metadata(&canonical_path)
        .map_err(|e| format!("cannot read config file metadata: {e}"))?;
    if metadata.len() > MAX_CONFIG_SIZE {
        return Err(format!(
            "config file too large: {} bytes (max: {MAX_CONFIG_SIZE} bytes)",
            metadata.len()
        )
        .into());
    }

    let config_data = fs::read_to_string(&canonical_path)
        .map_err(|e| format!("cannot read config file: {e}"))?;
    let config: GatewayConfig =
        serde_json::from_str(&config_data).map_err(|e| format!("invalid JSON: {e}"))?;

    debug!("loaded configuration with {} apis", config.apis.len());
    Ok(config)
}
