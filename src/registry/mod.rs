//! Middleware loader (C2): a kind-keyed registry of named plug-ins —
//! authentication strategies, circuit-breaker event notifiers — populated
//! once at startup. There is no dynamic code loading: every entry is
//! compiled into the binary and registered before the gateway starts
//! serving traffic, the same way the registries in the pack (e.g. a tool
//! registry keyed by name) are built up with `register`/`get` calls before
//! first use.

use crate::auth::AuthStrategy;
use crate::breaker::NotifyHook;
use crate::models::error::GatewayError;
use std::collections::HashMap;
use std::sync::Arc;

/// A single-kind name-to-plug-in map.
#[derive(Clone)]
pub struct Registry<T: ?Sized> {
    kind: &'static str,
    entries: HashMap<String, Arc<T>>,
}

impl<T: ?Sized> Registry<T> {
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }

    pub fn register(&mut self, name: impl Into<String>, value: Arc<T>) {
        self.entries.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Result<Arc<T>, GatewayError> {
        self.entries.get(name).cloned().ok_or_else(|| GatewayError::Loader {
            kind: self.kind,
            name: name.to_string(),
        })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.keys().map(|s| s.as_str()).collect()
    }
}

/// All plug-in registries the gateway consults while assembling pipelines.
///
/// Held behind `Arc` by [`crate::server::GatewayServer`] and shared, read-only,
/// across every pipeline built from it; reconfiguration replaces the whole
/// `PluginRegistries` rather than mutating entries in place.
pub struct PluginRegistries {
    pub auth: Registry<dyn AuthStrategy>,
    pub notifiers: Registry<dyn Fn(&str) + Send + Sync>,
}

impl PluginRegistries {
    pub fn new() -> Self {
        Self {
            auth: Registry::new("auth"),
            notifiers: Registry::new("notifier"),
        }
    }

    pub fn load_auth(&self, name: &str) -> Result<Arc<dyn AuthStrategy>, GatewayError> {
        self.auth.get(name)
    }

    pub fn load_notifier(&self, name: &str) -> Result<NotifyHook, GatewayError> {
        self.notifiers.get(name)
    }
}

impl Default for PluginRegistries {
    fn default() -> Self {
        Self::new()
    }
}
