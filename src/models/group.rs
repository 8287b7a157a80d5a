//! Group predicates: the data half of the group matcher (see [`crate::groups`]).

use serde::{Deserialize, Serialize};

/// A single condition over a request's method and/or path.
///
/// A predicate matches when every field that is present matches; an absent
/// field imposes no constraint. `url` is a regex evaluated against the
/// request path.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Predicate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// A named set of predicates. A group matches a request when *any* of its
/// predicates matches.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Group {
    pub name: String,
    pub predicates: Vec<Predicate>,
}

impl Group {
    /// Compiles every `url` predicate's regex up front so construction fails
    /// loudly rather than the first time a request is matched.
    pub fn validate(&self) -> Result<(), String> {
        for predicate in &self.predicates {
            if let Some(url) = &predicate.url {
                regex::Regex::new(url)
                    .map_err(|e| format!("group '{}' has invalid url regex: {e}", self.name))?;
            }
        }
        Ok(())
    }
}
