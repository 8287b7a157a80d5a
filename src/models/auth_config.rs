//! Authentication configuration: one entry per auth stage an API wants.

use log::error;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A reference to a named plug-in plus arbitrary options, the shape the
/// loader (C2) resolves against a kind-specific namespace.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct StrategyRef {
    pub name: String,
    #[serde(default)]
    pub options: Value,
}

/// One authentication stage for an API.
///
/// `group`, when present, scopes the stage to requests matching one of the
/// named groups; omitted, it is the API's "default" (catch-all) entry, of
/// which at most one may exist (see [`AuthenticationConfig::sort_default_last`]).
///
/// `use` references a shared entry in the pipeline's authentication
/// dictionary; fields set locally override the referenced entry's, and an
/// unresolved reference is a fatal configuration error.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct AuthenticationConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<StrategyRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group: Option<Vec<String>>,
    #[serde(rename = "use", default, skip_serializing_if = "Option::is_none")]
    pub use_ref: Option<String>,
}

impl AuthenticationConfig {
    /// Resolves a `use` reference by defaulting missing fields against the
    /// pipeline-level dictionary entry. Returns the config unchanged if
    /// there's no `use` to resolve.
    pub fn resolve<'a>(
        &'a self,
        dictionary: &'a std::collections::HashMap<String, AuthenticationConfig>,
    ) -> Result<std::borrow::Cow<'a, AuthenticationConfig>, String> {
        let Some(reference) = &self.use_ref else {
            return Ok(std::borrow::Cow::Borrowed(self));
        };
        let base = dictionary
            .get(reference)
            .ok_or_else(|| format!("unresolved authentication 'use' reference: {reference}"))?;
        Ok(std::borrow::Cow::Owned(AuthenticationConfig {
            strategy: self.strategy.clone().or_else(|| base.strategy.clone()),
            group: self.group.clone().or_else(|| base.group.clone()),
            use_ref: None,
        }))
    }

    /// Validates that at most one group-less (default) entry exists in a list,
    /// and returns the list with group-scoped entries first, the default last.
    ///
    /// This is the "default-last" sort shared with [`crate::breaker`]; kept
    /// as a free function so the ordering rule lives in exactly one place
    /// per config kind. More than one default entry is a contradiction
    /// confined to this one stage kind: it's logged and the whole
    /// authentication list is dropped for this API rather than guessing
    /// which default wins, leaving breaker/rate-limit/proxy stages intact.
    pub fn sort_default_last(mut entries: Vec<AuthenticationConfig>) -> Vec<AuthenticationConfig> {
        let default_count = entries.iter().filter(|e| e.group.is_none()).count();
        if default_count > 1 {
            error!(
                "at most one default (group-less) authentication entry is allowed, found {default_count}; dropping all authentication entries for this api"
            );
            return Vec::new();
        }
        entries.sort_by_key(|e| e.group.is_none());
        entries
    }
}
