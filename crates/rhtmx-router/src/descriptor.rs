//! Route descriptor types
//!
//! A route descriptor is the static, declarative description of one
//! navigable path: which section owns it, which component renders it and
//! which access rules apply. Descriptors are loaded once from JSON and never
//! mutated afterwards.

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::fmt;
use std::marker::PhantomData;

/// Role name used when a role map has no entry for the current role
pub const DEFAULT_ROLE_KEY: &str = "default";

/// Role wildcards accepted in `supportedRoles`
pub const ALL_ROLES: [&str; 2] = ["all", "any"];

/// Mapping from role name to a per-role value
///
/// Keeps entries in declaration order so the "first value" fallback is
/// deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleMap<T> {
    entries: Vec<(String, T)>,
}

impl<T> RoleMap<T> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Insert or replace the value for `role`, keeping its original position
    pub fn insert(&mut self, role: impl Into<String>, value: T) {
        let role = role.into();
        match self.entries.iter_mut().find(|(key, _)| *key == role) {
            Some((_, existing)) => *existing = value,
            None => self.entries.push((role, value)),
        }
    }

    pub fn get(&self, role: &str) -> Option<&T> {
        self.entries
            .iter()
            .find(|(key, _)| key == role)
            .map(|(_, value)| value)
    }

    pub fn contains_role(&self, role: &str) -> bool {
        self.get(role).is_some()
    }

    /// First declared value
    pub fn first(&self) -> Option<(&str, &T)> {
        self.entries
            .first()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &T)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn roles(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn values(&self) -> impl Iterator<Item = &T> {
        self.entries.iter().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for RoleMap<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Into<String>, T> FromIterator<(K, T)> for RoleMap<T> {
    fn from_iter<I: IntoIterator<Item = (K, T)>>(iter: I) -> Self {
        let mut map = RoleMap::new();
        for (role, value) in iter {
            map.insert(role, value);
        }
        map
    }
}

impl<T: Serialize> Serialize for RoleMap<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (role, value) in &self.entries {
            map.serialize_entry(role, value)?;
        }
        map.end()
    }
}

struct RoleMapVisitor<T> {
    marker: PhantomData<T>,
}

impl<'de, T: Deserialize<'de>> Visitor<'de> for RoleMapVisitor<T> {
    type Value = RoleMap<T>;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a map keyed by role name")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Self::Value, A::Error> {
        let mut map = RoleMap::new();
        while let Some((role, value)) = access.next_entry::<String, T>()? {
            map.insert(role, value);
        }
        Ok(map)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for RoleMap<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_map(RoleMapVisitor {
            marker: PhantomData,
        })
    }
}

/// Section owning a route: one name, or one name per role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SectionSpec {
    Single(String),
    ByRole(RoleMap<String>),
}

impl SectionSpec {
    pub fn is_role_based(&self) -> bool {
        matches!(self, SectionSpec::ByRole(_))
    }
}

impl From<&str> for SectionSpec {
    fn from(name: &str) -> Self {
        SectionSpec::Single(name.to_string())
    }
}

/// Role-specific component override
///
/// Accepts either `"role": "path"` or `"role": { "componentPath": "path" }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ComponentOverride {
    Path(String),
    Entry {
        #[serde(rename = "componentPath")]
        component_path: Option<String>,
    },
}

impl ComponentOverride {
    pub fn component_path(&self) -> Option<&str> {
        match self {
            ComponentOverride::Path(path) => Some(path.as_str()),
            ComponentOverride::Entry { component_path } => component_path.as_deref(),
        }
    }
}

/// One role-specific prerequisite, keyed by profile flag name
///
/// Only an object with `"required": true` is enforced. Any other shape,
/// such as a bare `true`, parses as a rule that is not required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DependencyRule {
    pub required: bool,
    pub fallback_slug: Option<String>,
}

impl DependencyRule {
    fn from_json(value: &Value) -> Self {
        let Value::Object(map) = value else {
            return Self::default();
        };
        Self {
            required: map.get("required").and_then(Value::as_bool).unwrap_or(false),
            fallback_slug: map
                .get("fallbackSlug")
                .and_then(Value::as_str)
                .map(str::to_string),
        }
    }
}

impl<'de> Deserialize<'de> for DependencyRule {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

/// Global onboarding prerequisite
///
/// `true` enables it with the default fallback; an object may carry its own
/// `fallbackSlug`. Other values count as set when they are truthy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum OnboardingRequirement {
    Flag(bool),
    Rule {
        #[serde(rename = "fallbackSlug")]
        fallback_slug: Option<String>,
    },
}

impl OnboardingRequirement {
    pub fn is_required(&self) -> bool {
        match self {
            OnboardingRequirement::Flag(flag) => *flag,
            OnboardingRequirement::Rule { .. } => true,
        }
    }

    pub fn fallback_slug(&self) -> Option<&str> {
        match self {
            OnboardingRequirement::Flag(_) => None,
            OnboardingRequirement::Rule { fallback_slug } => fallback_slug.as_deref(),
        }
    }

    fn from_json(value: &Value) -> Self {
        match value {
            Value::Object(map) => OnboardingRequirement::Rule {
                fallback_slug: map
                    .get("fallbackSlug")
                    .and_then(Value::as_str)
                    .map(str::to_string),
            },
            Value::Bool(flag) => OnboardingRequirement::Flag(*flag),
            Value::Null => OnboardingRequirement::Flag(false),
            Value::Number(n) => OnboardingRequirement::Flag(n.as_f64().is_some_and(|number| number != 0.0)),
            Value::String(text) => OnboardingRequirement::Flag(!text.is_empty()),
            Value::Array(_) => OnboardingRequirement::Flag(true),
        }
    }
}

impl<'de> Deserialize<'de> for OnboardingRequirement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDependencies {
    #[serde(default)]
    pub onboarding_required: Option<OnboardingRequirement>,

    /// role → (profile flag → rule)
    #[serde(default)]
    pub roles: RoleMap<RoleMap<DependencyRule>>,
}

fn default_enabled() -> bool {
    true
}

/// Static description of one route
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteDescriptor {
    /// Path pattern, e.g. `/dashboard/:id` or `/:pathMatch(.*)*`
    pub slug: String,

    #[serde(default)]
    pub section: Option<SectionSpec>,

    #[serde(default)]
    pub component_path: Option<String>,

    #[serde(default)]
    pub custom_component_path: RoleMap<ComponentOverride>,

    #[serde(default)]
    pub requires_auth: bool,

    #[serde(default)]
    pub redirect_if_not_auth: Option<String>,

    #[serde(default)]
    pub redirect_if_logged_in: Option<String>,

    /// Empty means unrestricted
    #[serde(default)]
    pub supported_roles: Vec<String>,

    #[serde(default, alias = "preloadSections")]
    pub pre_load_sections: Vec<String>,

    #[serde(default)]
    pub dependencies: Option<RouteDependencies>,

    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Static redirect target; such routes render nothing
    #[serde(default)]
    pub redirect: Option<String>,

    #[serde(default)]
    pub preload_exclude: bool,

    #[serde(default)]
    pub inherit_config_from_parent: bool,

    /// JSON the descriptor was parsed from, used for parent inheritance
    #[serde(skip)]
    pub source: Value,
}

impl RouteDescriptor {
    /// Create a minimal enabled route
    pub fn new(slug: impl Into<String>) -> Self {
        let slug = slug.into();
        Self {
            source: serde_json::json!({ "slug": slug }),
            slug,
            section: None,
            component_path: None,
            custom_component_path: RoleMap::new(),
            requires_auth: false,
            redirect_if_not_auth: None,
            redirect_if_logged_in: None,
            supported_roles: Vec::new(),
            pre_load_sections: Vec::new(),
            dependencies: None,
            enabled: true,
            redirect: None,
            preload_exclude: false,
            inherit_config_from_parent: false,
        }
    }

    /// Parse a descriptor from JSON, keeping the raw value
    pub fn from_value(value: Value) -> Result<Self, serde_json::Error> {
        let mut route: RouteDescriptor = serde_json::from_value(value.clone())?;
        route.source = value;
        Ok(route)
    }

    pub fn is_redirect(&self) -> bool {
        self.redirect.is_some()
    }

    /// Check if any role may visit this route
    pub fn allows_all_roles(&self) -> bool {
        self.supported_roles.is_empty()
            || self
                .supported_roles
                .iter()
                .any(|role| ALL_ROLES.contains(&role.as_str()))
    }

    /// Check if the slug contains parameters or a catch-all
    pub fn is_dynamic(&self) -> bool {
        self.slug.contains(':') || self.slug.contains('*')
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_role_map_keeps_declaration_order() {
        let map: RoleMap<String> =
            serde_json::from_value(json!({ "fan": "a", "creator": "b", "agent": "c" })).unwrap();

        let roles: Vec<&str> = map.roles().collect();
        assert_eq!(roles, vec!["fan", "creator", "agent"]);
        assert_eq!(map.first(), Some(("fan", &"a".to_string())));
    }

    #[test]
    fn test_role_map_insert_replaces_in_place() {
        let mut map: RoleMap<u32> = [("a", 1), ("b", 2)].into_iter().collect();
        map.insert("a", 10);

        assert_eq!(map.get("a"), Some(&10));
        assert_eq!(map.first(), Some(("a", &10)));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_role_map_serializes_in_order() {
        let map: RoleMap<&str> = [("z", "1"), ("a", "2")].into_iter().collect();
        let text = serde_json::to_string(&map).unwrap();
        assert_eq!(text, r#"{"z":"1","a":"2"}"#);
    }

    #[test]
    fn test_descriptor_defaults() {
        let route = RouteDescriptor::from_value(json!({ "slug": "/home" })).unwrap();

        assert!(route.enabled);
        assert!(!route.requires_auth);
        assert!(route.allows_all_roles());
        assert!(route.section.is_none());
        assert_eq!(route.source, json!({ "slug": "/home" }));
    }

    #[test]
    fn test_descriptor_full_shape() {
        let route = RouteDescriptor::from_value(json!({
            "slug": "/dashboard",
            "section": { "creator": "creatorDashboard", "default": "dashboard" },
            "componentPath": "@/views/Dashboard.vue",
            "customComponentPath": {
                "creator": { "componentPath": "@/views/CreatorDashboard.vue" }
            },
            "requiresAuth": true,
            "supportedRoles": ["creator", "fan"],
            "preLoadSections": ["profile"],
            "dependencies": {
                "onboardingRequired": { "fallbackSlug": "/welcome" },
                "roles": { "creator": { "kycPassed": { "required": true, "fallbackSlug": "/kyc" } } }
            }
        }))
        .unwrap();

        assert!(matches!(route.section, Some(SectionSpec::ByRole(_))));
        assert_eq!(
            route
                .custom_component_path
                .get("creator")
                .and_then(ComponentOverride::component_path),
            Some("@/views/CreatorDashboard.vue")
        );
        assert!(!route.allows_all_roles());

        let deps = route.dependencies.unwrap();
        let onboarding = deps.onboarding_required.unwrap();
        assert!(onboarding.is_required());
        assert_eq!(onboarding.fallback_slug(), Some("/welcome"));

        let kyc = deps.roles.get("creator").and_then(|rules| rules.get("kycPassed"));
        assert_eq!(
            kyc,
            Some(&DependencyRule {
                required: true,
                fallback_slug: Some("/kyc".to_string()),
            })
        );
    }

    #[test]
    fn test_preload_sections_alias() {
        let route =
            RouteDescriptor::from_value(json!({ "slug": "/a", "preloadSections": ["x"] })).unwrap();
        assert_eq!(route.pre_load_sections, vec!["x".to_string()]);
    }

    #[test]
    fn test_onboarding_flag_shape() {
        let deps: RouteDependencies =
            serde_json::from_value(json!({ "onboardingRequired": true })).unwrap();
        let onboarding = deps.onboarding_required.unwrap();
        assert!(onboarding.is_required());
        assert_eq!(onboarding.fallback_slug(), None);
    }

    #[test]
    fn test_dependency_rule_shorthand_is_not_required() {
        let deps: RouteDependencies = serde_json::from_value(json!({
            "roles": { "creator": { "kycPassed": true, "bankLinked": "yes", "emailVerified": null } }
        }))
        .unwrap();

        let rules = deps.roles.get("creator").unwrap();
        assert_eq!(rules.len(), 3);
        assert!(rules.values().all(|rule| *rule == DependencyRule::default()));
    }

    #[test]
    fn test_dependency_rule_ignores_mistyped_fields() {
        let rule: DependencyRule =
            serde_json::from_value(json!({ "required": "true", "fallbackSlug": 42 })).unwrap();
        assert_eq!(rule, DependencyRule::default());
    }

    #[rstest]
    #[case(json!(false), false, None)]
    #[case(json!(null), false, None)]
    #[case(json!(1), true, None)]
    #[case(json!(0), false, None)]
    #[case(json!("yes"), true, None)]
    #[case(json!({ "fallbackSlug": 7 }), true, None)]
    #[case(json!({}), true, None)]
    fn test_onboarding_lenient_shapes(
        #[case] raw: Value,
        #[case] required: bool,
        #[case] fallback: Option<&str>,
    ) {
        let onboarding: OnboardingRequirement = serde_json::from_value(raw).unwrap();
        assert_eq!(onboarding.is_required(), required);
        assert_eq!(onboarding.fallback_slug(), fallback);
    }

    #[test]
    fn test_dependency_keys_keep_declaration_order() {
        let route = RouteDescriptor::from_value(json!({
            "slug": "/studio",
            "dependencies": {
                "roles": {
                    "fan": {},
                    "creator": {
                        "kycPassed": { "required": true, "fallbackSlug": "/kyc" },
                        "bankLinked": { "required": true, "fallbackSlug": "/bank" }
                    }
                }
            }
        }))
        .unwrap();

        let roles = &route.dependencies.unwrap().roles;
        assert_eq!(roles.roles().collect::<Vec<_>>(), vec!["fan", "creator"]);

        let flags: Vec<&str> = roles.get("creator").unwrap().roles().collect();
        assert_eq!(flags, vec!["kycPassed", "bankLinked"]);
    }

    #[test]
    fn test_all_roles_wildcard() {
        let mut route = RouteDescriptor::new("/open");
        route.supported_roles = vec!["any".to_string()];
        assert!(route.allows_all_roles());
    }
}
