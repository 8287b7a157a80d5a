//! Mount-stripping and upstream URL construction for the proxy stage.
//!
//! Grounded on the teacher's `format_route` (host/port/path join), adapted
//! to a config shape where `proxy.target` is already a full base URL and the
//! mount point must be stripped from the incoming path before forwarding.

/// Strips `mount` from the front of `full_path`, returning what's left
/// (always starting with `/`, or empty if the request targeted the mount
/// root exactly).
///
/// `mount` is normalized without a trailing slash before comparison, so
/// `"/api/"` and `"/api"` behave identically.
pub fn strip_mount<'a>(full_path: &'a str, mount: &str) -> &'a str {
    let mount = mount.trim_end_matches('/');
    match full_path.strip_prefix(mount) {
        Some(rest) => rest,
        None => full_path,
    }
}

/// Joins an upstream base URL with the remaining path (and query string),
/// producing a single request URL.
///
/// # Examples
///
/// ```
/// use gatewright::utils::path::join_upstream_url;
///
/// let url = join_upstream_url("http://backend:8080", "/users/123");
/// assert_eq!(url, "http://backend:8080/users/123");
/// ```
pub fn join_upstream_url(target: &str, remaining_path: &str) -> String {
    let target = target.trim_end_matches('/');
    if remaining_path.is_empty() {
        target.to_string()
    } else if remaining_path.starts_with('/') {
        format!("{target}{remaining_path}")
    } else {
        format!("{target}/{remaining_path}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_a_matching_mount() {
        assert_eq!(strip_mount("/api/users/1", "/api"), "/users/1");
    }

    #[test]
    fn strips_mount_with_trailing_slash() {
        assert_eq!(strip_mount("/api/users/1", "/api/"), "/users/1");
    }

    #[test]
    fn leaves_unmatched_path_untouched() {
        assert_eq!(strip_mount("/other/path", "/api"), "/other/path");
    }

    #[test]
    fn joins_target_and_remaining_path() {
        assert_eq!(join_upstream_url("http://backend:8080", "/users/1"), "http://backend:8080/users/1");
        assert_eq!(join_upstream_url("http://backend:8080/", "/users/1"), "http://backend:8080/users/1");
    }

    #[test]
    fn joins_with_empty_remaining_path() {
        assert_eq!(join_upstream_url("http://backend:8080", ""), "http://backend:8080");
    }
}
