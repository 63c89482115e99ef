//! Route table and path resolution

use crate::descriptor::RouteDescriptor;
use crate::merge::deep_merge_prefer_child;
use crate::path::{normalize_path, prefixes, split_query, PathHierarchy};
use crate::pattern::{PathParams, RoutePattern};
use serde_json::Value;
use tracing::{debug, warn};

/// A route together with the parameters extracted from the path
#[derive(Debug, Clone, PartialEq)]
pub struct RouteMatch<'a> {
    pub route: &'a RouteDescriptor,
    pub params: PathParams,
    /// `true` when the slug matched the path literally
    pub exact: bool,
}

#[derive(Debug, Clone)]
struct RouteEntry {
    route: RouteDescriptor,
    slug: String,
    pattern: RoutePattern,
}

impl RouteEntry {
    fn new(route: RouteDescriptor) -> Self {
        let slug = normalize_path(&route.slug).into_owned();
        let pattern = RoutePattern::parse(&slug);
        Self {
            route,
            slug,
            pattern,
        }
    }
}

/// Immutable, ordered set of route descriptors
///
/// Declaration order matters: among dynamic routes the first match wins.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    entries: Vec<RouteEntry>,
}

impl RouteTable {
    pub fn from_routes(routes: impl IntoIterator<Item = RouteDescriptor>) -> Self {
        Self {
            entries: routes.into_iter().map(RouteEntry::new).collect(),
        }
    }

    /// Build a table from a JSON array of descriptors
    ///
    /// Routes that fail to parse are skipped with a warning; a value that is
    /// not an array yields an empty table.
    pub fn from_value(value: Value) -> Self {
        let Value::Array(items) = value else {
            warn!("Route config is not an array, using empty route table");
            return Self::default();
        };

        let routes = items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match RouteDescriptor::from_value(item) {
                Ok(route) => Some(route),
                Err(e) => {
                    warn!(index, error = %e, "Skipping malformed route");
                    None
                }
            });

        let table = Self::from_routes(routes);
        debug!(routes = table.len(), "Route table loaded");
        table
    }

    /// Build a table from JSON text, falling back to an empty table
    pub fn from_json_str(text: &str) -> Self {
        match serde_json::from_str::<Value>(text) {
            Ok(value) => Self::from_value(value),
            Err(e) => {
                warn!(error = %e, "Route config is not valid JSON, using empty route table");
                Self::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn routes(&self) -> impl Iterator<Item = &RouteDescriptor> {
        self.entries.iter().map(|entry| &entry.route)
    }

    /// Route whose slug equals `slug` exactly
    pub fn get(&self, slug: &str) -> Option<&RouteDescriptor> {
        let slug = normalize_path(slug);
        self.entries
            .iter()
            .find(|entry| entry.slug == slug)
            .map(|entry| &entry.route)
    }

    /// Match a navigation target against the table
    ///
    /// Exact slug matches are tried first; then every dynamic slug in
    /// declaration order. Query string and fragment are ignored.
    pub fn match_route(&self, target: &str) -> Option<RouteMatch<'_>> {
        let (path, _) = split_query(target);
        let path = normalize_path(path);

        if let Some(entry) = self.entries.iter().find(|entry| entry.slug == path) {
            debug!(slug = %entry.slug, "Exact route match");
            return Some(RouteMatch {
                route: &entry.route,
                params: PathParams::new(),
                exact: true,
            });
        }

        let found = self
            .entries
            .iter()
            .filter(|entry| entry.pattern.is_dynamic())
            .find_map(|entry| {
                entry.pattern.match_path(&path).map(|params| RouteMatch {
                    route: &entry.route,
                    params,
                    exact: false,
                })
            });

        match &found {
            Some(matched) => debug!(slug = %matched.route.slug, path = %path, "Dynamic route match"),
            None => debug!(path = %path, "No route matches path"),
        }
        found
    }

    /// Resolve the descriptor for a navigation target
    pub fn resolve_route_from_path(&self, target: &str) -> Option<&RouteDescriptor> {
        self.match_route(target).map(|matched| matched.route)
    }

    /// Nearest registered ancestor of `slug`, excluding the root
    pub fn find_parent_route(&self, slug: &str) -> Option<&RouteDescriptor> {
        let slug = normalize_path(slug);
        let parent = PathHierarchy::ancestors(&slug).find_map(|candidate| self.get(candidate));
        parent
    }

    /// Apply parent inheritance to `route`
    ///
    /// Only routes with `inheritConfigFromParent` are merged. The child's
    /// declared keys win at every level; keys it never declared come from
    /// the parent.
    pub fn inherit_configuration_from_parent_route(&self, route: &RouteDescriptor) -> RouteDescriptor {
        if !route.inherit_config_from_parent {
            return route.clone();
        }

        let Some(parent) = self.find_parent_route(&route.slug) else {
            debug!(slug = %route.slug, "No parent route to inherit from");
            return route.clone();
        };

        let merged = deep_merge_prefer_child(&parent.source, &route.source);
        match RouteDescriptor::from_value(merged) {
            Ok(inherited) => {
                debug!(slug = %route.slug, parent = %parent.slug, "Inherited parent route config");
                inherited
            }
            Err(e) => {
                warn!(slug = %route.slug, error = %e, "Merged route config is invalid, using child as is");
                route.clone()
            }
        }
    }

    /// Matched routes for each ancestor prefix of `target`, root-most first
    ///
    /// The root itself is never a prefix. Every prefix that resolves is
    /// included, catch-all matches too.
    pub fn get_route_chain_for_path(&self, target: &str) -> Vec<&RouteDescriptor> {
        let (path, _) = split_query(target);
        let chain: Vec<&RouteDescriptor> = prefixes(&normalize_path(path))
            .iter()
            .filter_map(|prefix| self.match_route(prefix).map(|matched| matched.route))
            .collect();
        debug!(target, depth = chain.len(), "Route chain resolved");
        chain
    }
}

/// Component to render for `route` and `role`
///
/// Redirect routes render nothing. A role-specific override wins over the
/// default component path.
pub fn resolve_component_path_for_route(route: &RouteDescriptor, role: Option<&str>) -> Option<String> {
    if route.is_redirect() {
        return None;
    }

    let role_specific = role
        .and_then(|role| route.custom_component_path.get(role))
        .and_then(|entry| entry.component_path())
        .filter(|path| !path.is_empty());

    if let Some(path) = role_specific {
        debug!(slug = %route.slug, ?role, component = path, "Role-specific component");
        return Some(path.to_string());
    }

    route
        .component_path
        .as_deref()
        .filter(|path| !path.is_empty())
        .map(str::to_string)
}
