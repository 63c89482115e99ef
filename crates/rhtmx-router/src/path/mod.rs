//! Path normalization helpers
//!
//! Navigation targets arrive from links, the address bar and configuration,
//! so they are normalized before any slug comparison.

use std::borrow::Cow;

pub mod hierarchy;
pub use hierarchy::PathHierarchy;

/// Check if a path is already canonical
///
/// Canonical paths start with `/`, contain no `//` or `\`, and have no
/// trailing slash unless they are the root.
///
/// ```
/// use rhtmx_router::path::is_canonical_path;
///
/// assert!(is_canonical_path("/"));
/// assert!(is_canonical_path("/dashboard/settings"));
/// assert!(!is_canonical_path("dashboard"));
/// assert!(!is_canonical_path("/dashboard/"));
/// ```
pub fn is_canonical_path(path: &str) -> bool {
    if path.is_empty() || !path.starts_with('/') {
        return false;
    }
    if path.contains("//") || path.contains('\\') {
        return false;
    }
    path == "/" || !path.ends_with('/')
}

/// Normalize a path to canonical form
///
/// Borrows when the input is already canonical.
///
/// ```
/// use rhtmx_router::path::normalize_path;
///
/// assert_eq!(normalize_path("/log-in/"), "/log-in");
/// assert_eq!(normalize_path("dashboard//settings"), "/dashboard/settings");
/// assert_eq!(normalize_path(""), "/");
/// ```
pub fn normalize_path(path: &str) -> Cow<'_, str> {
    if is_canonical_path(path) {
        return Cow::Borrowed(path);
    }

    let joined = path
        .replace('\\', "/")
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");

    if joined.is_empty() {
        Cow::Borrowed("/")
    } else {
        Cow::Owned(format!("/{}", joined))
    }
}

/// Split a navigation target into its path and query string
///
/// The fragment, if any, is dropped.
///
/// ```
/// use rhtmx_router::path::split_query;
///
/// assert_eq!(split_query("/feed?locale=vi#top"), ("/feed", Some("locale=vi")));
/// assert_eq!(split_query("/feed"), ("/feed", None));
/// ```
pub fn split_query(target: &str) -> (&str, Option<&str>) {
    let without_fragment = target.split('#').next().unwrap_or(target);
    match without_fragment.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (without_fragment, None),
    }
}

/// Non-empty segments of a path
pub fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|segment| !segment.is_empty()).collect()
}

/// Ancestor prefixes of a path, shortest first, ending with the path itself
///
/// `/a/b/c` yields `/a`, `/a/b`, `/a/b/c`. The root has no prefixes.
pub fn prefixes(path: &str) -> Vec<String> {
    let parts = segments(path);
    (1..=parts.len())
        .map(|depth| format!("/{}", parts[..depth].join("/")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_canonical_path() {
        assert!(is_canonical_path("/"));
        assert!(is_canonical_path("/sign-up/onboarding"));

        assert!(!is_canonical_path(""));
        assert!(!is_canonical_path("feed"));
        assert!(!is_canonical_path("/feed/"));
        assert!(!is_canonical_path("/feed//post"));
        assert!(!is_canonical_path("/feed\\post"));
    }

    #[test]
    fn test_normalize_borrows_canonical() {
        assert!(matches!(normalize_path("/feed"), Cow::Borrowed("/feed")));
        assert!(matches!(normalize_path("/"), Cow::Borrowed("/")));
    }

    #[test]
    fn test_normalize_repairs() {
        assert_eq!(normalize_path("/feed/"), "/feed");
        assert_eq!(normalize_path("/a///b"), "/a/b");
        assert_eq!(normalize_path("\\a\\b"), "/a/b");
        assert_eq!(normalize_path("a/b"), "/a/b");
        assert_eq!(normalize_path("///"), "/");
    }

    #[test]
    fn test_split_query() {
        assert_eq!(split_query("/?locale=en"), ("/", Some("locale=en")));
        assert_eq!(split_query("/a#frag"), ("/a", None));
    }

    #[test]
    fn test_prefixes() {
        assert_eq!(prefixes("/a/b/c"), vec!["/a", "/a/b", "/a/b/c"]);
        assert!(prefixes("/").is_empty());
    }

    #[test]
    fn test_hierarchy_walks_to_root() {
        let paths: Vec<&str> = PathHierarchy::new("/dashboard/settings/privacy").collect();
        assert_eq!(
            paths,
            vec![
                "/dashboard/settings/privacy",
                "/dashboard/settings",
                "/dashboard",
                "/"
            ]
        );
    }
}
