//! Group Matcher (C3): compiles named predicate groups into a boolean filter
//! applied per request.
//!
//! A `GroupFilter` is the compiled union of every predicate across the
//! referenced groups. It is a pure function of the request: no I/O, no
//! shared state, safe to call from any stage without synchronization.

use crate::models::group::{Group, Predicate};
use actix_web::dev::ServiceRequest;
use regex::Regex;

/// One compiled predicate: a method match and/or an anchored path regex.
struct CompiledPredicate {
    method: Option<String>,
    url: Option<Regex>,
}

impl CompiledPredicate {
    fn matches(&self, method: &str, path: &str) -> bool {
        if let Some(expected) = &self.method {
            if !expected.eq_ignore_ascii_case(method) {
                return false;
            }
        }
        if let Some(re) = &self.url {
            if !re.is_match(path) {
                return false;
            }
        }
        true
    }
}

/// A compiled, request-evaluable group filter.
///
/// `None` (absent filter) means "unconditional apply" — the caller should
/// treat a missing `GroupFilter` as always-true rather than constructing one
/// from an empty predicate list (an empty predicate list matches nothing,
/// which is the opposite of "no group specified").
pub struct GroupFilter {
    predicates: Vec<CompiledPredicate>,
}

impl GroupFilter {
    /// Evaluates the filter against a live `ServiceRequest`.
    pub fn matches_service_request(&self, req: &ServiceRequest) -> bool {
        self.matches(req.method().as_str(), req.path())
    }

    /// Evaluates the filter against raw method/path, useful in tests.
    pub fn matches(&self, method: &str, path: &str) -> bool {
        self.predicates.iter().any(|p| p.matches(method, path))
    }
}

/// Compiles the union of predicates across `names` looked up in `groups`.
///
/// Returns `Ok(None)` when `names` is empty or absent — callers should treat
/// that as an unconditional stage. Returns an error if a name isn't declared
/// on the API or a predicate's regex fails to compile (though regexes are
/// normally validated earlier, at `ApiConfig::validate` time).
pub fn build_allow_filter(
    groups: &[Group],
    names: Option<&[String]>,
) -> Result<Option<GroupFilter>, String> {
    let Some(names) = names else {
        return Ok(None);
    };
    if names.is_empty() {
        return Ok(None);
    }

    let mut predicates = Vec::new();
    for name in names {
        let group = groups
            .iter()
            .find(|g| &g.name == name)
            .ok_or_else(|| format!("unknown group reference: {name}"))?;
        for predicate in &group.predicates {
            predicates.push(compile(predicate)?);
        }
    }

    Ok(Some(GroupFilter { predicates }))
}

/// Resolves the `Group` objects referenced by `names`, for logging.
pub fn resolve_groups<'a>(groups: &'a [Group], names: &[String]) -> Vec<&'a Group> {
    names
        .iter()
        .filter_map(|n| groups.iter().find(|g| &g.name == n))
        .collect()
}

fn compile(predicate: &Predicate) -> Result<CompiledPredicate, String> {
    let url = predicate
        .url
        .as_ref()
        .map(|pattern| Regex::new(pattern).map_err(|e| format!("invalid group url regex: {e}")))
        .transpose()?;
    Ok(CompiledPredicate {
        method: predicate.method.clone(),
        url,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::group::{Group, Predicate};

    fn groups() -> Vec<Group> {
        vec![
            Group {
                name: "admins".to_string(),
                predicates: vec![Predicate {
                    method: None,
                    url: Some("^/admin".to_string()),
                }],
            },
            Group {
                name: "writers".to_string(),
                predicates: vec![Predicate {
                    method: Some("POST".to_string()),
                    url: None,
                }],
            },
        ]
    }

    #[test]
    fn absent_names_means_unconditional() {
        let filter = build_allow_filter(&groups(), None).unwrap();
        assert!(filter.is_none());
        let filter = build_allow_filter(&groups(), Some(&[])).unwrap();
        assert!(filter.is_none());
    }

    #[test]
    fn matches_any_referenced_group() {
        let names = vec!["admins".to_string()];
        let filter = build_allow_filter(&groups(), Some(&names)).unwrap().unwrap();
        assert!(filter.matches("GET", "/admin/x"));
        assert!(!filter.matches("GET", "/api/x"));
    }

    #[test]
    fn union_across_multiple_groups() {
        let names = vec!["admins".to_string(), "writers".to_string()];
        let filter = build_allow_filter(&groups(), Some(&names)).unwrap().unwrap();
        assert!(filter.matches("GET", "/admin/x"));
        assert!(filter.matches("POST", "/anything"));
        assert!(!filter.matches("GET", "/anything"));
    }

    #[test]
    fn unknown_group_name_is_an_error() {
        let names = vec!["ghost".to_string()];
        assert!(build_allow_filter(&groups(), Some(&names)).is_err());
    }
}
