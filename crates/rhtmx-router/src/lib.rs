//! # RHTMX Router
//!
//! Declarative route table for client navigation:
//! - Static slugs (`/dashboard`)
//! - Parameters (`/profile/:username`) and optional parameters (`/settings/:tab?`)
//! - Catch-all slugs (`/files/*path`, `/:pathMatch(.*)*`)
//! - Role-keyed sections and component overrides
//! - Parent config inheritance via JSON deep merge
//! - Route config validation
//!
//! ## Path Normalization
//!
//! Targets are normalized before matching, so `/feed/`, `//feed` and
//! `/feed?tab=new` all resolve like `/feed`.
//!
//! ## Example
//!
//! ```
//! use rhtmx_router::{resolve_component_path_for_route, RouteTable};
//!
//! let table = RouteTable::from_json_str(r#"[
//!     { "slug": "/profile/:username", "componentPath": "Profile", "section": "profile" },
//!     { "slug": "/:pathMatch(.*)*", "componentPath": "NotFound" }
//! ]"#);
//!
//! let matched = table.match_route("/profile/alice").unwrap();
//! assert_eq!(matched.params.get("username"), Some(&"alice".to_string()));
//! assert_eq!(
//!     resolve_component_path_for_route(matched.route, Some("fan")),
//!     Some("Profile".to_string())
//! );
//! ```

pub mod descriptor;
pub mod merge;
pub mod path;
pub mod pattern;
pub mod resolver;
pub mod section;
pub mod validate;

pub use descriptor::{
    ComponentOverride, DependencyRule, OnboardingRequirement, RoleMap, RouteDependencies,
    RouteDescriptor, SectionSpec, ALL_ROLES, DEFAULT_ROLE_KEY,
};
pub use merge::deep_merge_prefer_child;
pub use path::{is_canonical_path, normalize_path, split_query, PathHierarchy};
pub use pattern::{classify_segment, PathParams, PatternSegment, RoutePattern};
pub use resolver::{resolve_component_path_for_route, RouteMatch, RouteTable};
pub use section::{
    get_all_route_sections_for_route, get_all_section_variants, get_preload_sections_for_route,
    is_section_role_based, resolve_role_section_variant, resolve_section_for_role,
};
pub use validate::{
    validate_route_config, validate_route_config_str, IssueKind, ValidationIssue, ValidationReport,
};
