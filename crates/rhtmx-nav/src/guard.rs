//! Navigation guard chain
//!
//! Guards run in a fixed order and the first one that blocks wins:
//!
//! 1. Loop prevention
//! 2. Enabled check
//! 3. Authentication
//! 4. Role
//! 5. Dependencies (role-specific prerequisites, then onboarding)
//!
//! A guard returning an error blocks the navigation with a redirect to the
//! not-found path. That is the only way the chain fails closed; every other
//! problem in this crate degrades to an empty result instead.

use crate::config::GuardConfig;
use crate::error::GuardError;
use crate::history::NavigationHistory;
use rhtmx_router::RouteDescriptor;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of one guard or of the whole chain
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardResult {
    pub allow: bool,
    pub redirect_to: Option<String>,
    pub reason: String,
}

impl GuardResult {
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            allow: true,
            redirect_to: None,
            reason: reason.into(),
        }
    }

    pub fn redirect(to: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            allow: false,
            redirect_to: Some(to.into()),
            reason: reason.into(),
        }
    }
}

/// Auth state the guards read
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuardContext {
    #[serde(default)]
    pub is_authenticated: bool,

    #[serde(default)]
    pub user_role: Option<String>,

    /// Profile flags such as `onboardingPassed` or `kycPassed`
    #[serde(default)]
    pub user_profile: Map<String, Value>,
}

impl GuardContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn authenticated(role: impl Into<String>) -> Self {
        Self {
            is_authenticated: true,
            user_role: Some(role.into()),
            user_profile: Map::new(),
        }
    }

    /// Set a boolean profile flag
    pub fn with_flag(mut self, flag: impl Into<String>, value: bool) -> Self {
        self.user_profile.insert(flag.into(), Value::Bool(value));
        self
    }

    /// The user's role, or `default` when none is set
    pub fn role_or<'a>(&'a self, default: &'a str) -> &'a str {
        self.user_role
            .as_deref()
            .filter(|role| !role.is_empty())
            .unwrap_or(default)
    }

    /// Check if a profile flag is literally `true`
    pub fn has_flag(&self, flag: &str) -> bool {
        matches!(self.user_profile.get(flag), Some(Value::Bool(true)))
    }
}

/// What a guard is asked to judge
#[derive(Debug, Clone, Copy)]
pub struct GuardRequest<'a> {
    /// Concrete navigation path
    pub path: &'a str,
    /// Resolved descriptor for `path`, after inheritance
    pub route: Option<&'a RouteDescriptor>,
    /// Path the user is navigating away from
    pub from: Option<&'a str>,
}

impl<'a> GuardRequest<'a> {
    pub fn new(path: &'a str, route: Option<&'a RouteDescriptor>) -> Self {
        Self {
            path,
            route,
            from: None,
        }
    }

    pub fn from_path(mut self, from: Option<&'a str>) -> Self {
        self.from = from;
        self
    }

    /// The target route, or an error if nothing resolved
    pub fn route(&self) -> Result<&'a RouteDescriptor, GuardError> {
        self.route
            .ok_or_else(|| GuardError::MissingTarget(self.path.to_string()))
    }
}

/// One step of the chain
pub trait RouteGuard: Send + Sync {
    fn name(&self) -> &'static str;

    fn check(
        &self,
        request: &GuardRequest<'_>,
        context: &GuardContext,
    ) -> Result<GuardResult, GuardError>;
}

/// Blocks a path that keeps coming back within a short window
pub struct LoopGuard {
    history: Arc<NavigationHistory>,
    window: usize,
    threshold: usize,
    not_found_path: String,
}

impl LoopGuard {
    pub fn new(history: Arc<NavigationHistory>, config: &GuardConfig) -> Self {
        Self {
            history,
            window: config.loop_window,
            threshold: config.loop_threshold,
            not_found_path: config.not_found_path.clone(),
        }
    }
}

impl RouteGuard for LoopGuard {
    fn name(&self) -> &'static str {
        "loop"
    }

    fn check(&self, request: &GuardRequest<'_>, _: &GuardContext) -> Result<GuardResult, GuardError> {
        let repeats = self
            .history
            .count_then_record_attempt(request.path, self.window);

        if repeats >= self.threshold {
            warn!(path = request.path, repeats, "Navigation loop detected");
            return Ok(GuardResult::redirect(
                &self.not_found_path,
                "Navigation loop detected",
            ));
        }
        Ok(GuardResult::allow("No loop detected"))
    }
}

/// Disabled routes behave as if they didn't exist
pub struct EnabledGuard {
    not_found_path: String,
}

impl EnabledGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            not_found_path: config.not_found_path.clone(),
        }
    }
}

impl RouteGuard for EnabledGuard {
    fn name(&self) -> &'static str {
        "enabled"
    }

    fn check(&self, request: &GuardRequest<'_>, _: &GuardContext) -> Result<GuardResult, GuardError> {
        let route = request.route()?;
        if !route.enabled {
            debug!(slug = %route.slug, "Route is disabled");
            return Ok(GuardResult::redirect(&self.not_found_path, "Route is disabled"));
        }
        Ok(GuardResult::allow("Route is enabled"))
    }
}

pub struct AuthGuard {
    login_path: String,
}

impl AuthGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            login_path: config.login_path.clone(),
        }
    }
}

impl RouteGuard for AuthGuard {
    fn name(&self) -> &'static str {
        "auth"
    }

    fn check(
        &self,
        request: &GuardRequest<'_>,
        context: &GuardContext,
    ) -> Result<GuardResult, GuardError> {
        let route = request.route()?;

        if route.requires_auth && !context.is_authenticated {
            let target = route
                .redirect_if_not_auth
                .as_deref()
                .filter(|path| !path.is_empty())
                .unwrap_or(&self.login_path);
            debug!(slug = %route.slug, redirect = target, "Authentication required");
            return Ok(GuardResult::redirect(target, "Authentication required"));
        }

        if let Some(target) = route
            .redirect_if_logged_in
            .as_deref()
            .filter(|path| !path.is_empty())
        {
            if context.is_authenticated {
                debug!(slug = %route.slug, redirect = target, "Already authenticated");
                return Ok(GuardResult::redirect(target, "Already authenticated"));
            }
        }

        Ok(GuardResult::allow("Authentication check passed"))
    }
}

pub struct RoleGuard {
    default_role: String,
    not_found_path: String,
}

impl RoleGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            default_role: config.default_role.clone(),
            not_found_path: config.not_found_path.clone(),
        }
    }
}

impl RouteGuard for RoleGuard {
    fn name(&self) -> &'static str {
        "role"
    }

    fn check(
        &self,
        request: &GuardRequest<'_>,
        context: &GuardContext,
    ) -> Result<GuardResult, GuardError> {
        let route = request.route()?;

        if route.supported_roles.is_empty() {
            return Ok(GuardResult::allow("No role restrictions"));
        }
        if route.allows_all_roles() {
            return Ok(GuardResult::allow("Route allows all roles"));
        }

        let role = context.role_or(&self.default_role);
        if !route.supported_roles.iter().any(|supported| supported == role) {
            debug!(slug = %route.slug, role, "Role not authorized");
            return Ok(GuardResult::redirect(
                &self.not_found_path,
                format!("Role {} not authorized", role),
            ));
        }

        Ok(GuardResult::allow("Role check passed"))
    }
}

pub struct DependencyGuard {
    default_role: String,
    dependency_fallback: String,
    onboarding_fallback: String,
}

impl DependencyGuard {
    pub fn new(config: &GuardConfig) -> Self {
        Self {
            default_role: config.default_role.clone(),
            dependency_fallback: config.dependency_fallback.clone(),
            onboarding_fallback: config.onboarding_fallback.clone(),
        }
    }
}

impl RouteGuard for DependencyGuard {
    fn name(&self) -> &'static str {
        "dependency"
    }

    fn check(
        &self,
        request: &GuardRequest<'_>,
        context: &GuardContext,
    ) -> Result<GuardResult, GuardError> {
        let route = request.route()?;
        let Some(dependencies) = &route.dependencies else {
            return Ok(GuardResult::allow("No dependencies"));
        };

        let role = context.role_or(&self.default_role);
        if let Some(rules) = dependencies.roles.get(role) {
            for (flag, rule) in rules.iter() {
                if rule.required && !context.has_flag(flag) {
                    let target = rule
                        .fallback_slug
                        .as_deref()
                        .filter(|path| !path.is_empty())
                        .unwrap_or(&self.dependency_fallback);
                    debug!(slug = %route.slug, role, dependency = flag, "Missing required dependency");
                    return Ok(GuardResult::redirect(
                        target,
                        format!("Missing required dependency: {}", flag),
                    ));
                }
            }
        }

        if let Some(onboarding) = &dependencies.onboarding_required {
            if onboarding.is_required() && !context.has_flag("onboardingPassed") {
                let target = onboarding
                    .fallback_slug()
                    .filter(|path| !path.is_empty())
                    .unwrap_or(&self.onboarding_fallback);
                debug!(slug = %route.slug, redirect = target, "Onboarding not completed");
                return Ok(GuardResult::redirect(target, "Onboarding not completed"));
            }
        }

        Ok(GuardResult::allow("All dependencies met"))
    }
}

/// Ordered, short-circuiting list of guards
pub struct GuardChain {
    guards: Vec<Box<dyn RouteGuard>>,
    not_found_path: String,
}

impl GuardChain {
    /// An empty chain that allows everything
    pub fn empty(not_found_path: impl Into<String>) -> Self {
        Self {
            guards: Vec::new(),
            not_found_path: not_found_path.into(),
        }
    }

    /// The five built-in guards in their fixed order
    pub fn standard(config: &GuardConfig, history: Arc<NavigationHistory>) -> Self {
        let mut chain = Self::empty(&config.not_found_path);
        chain.push(LoopGuard::new(history, config));
        chain.push(EnabledGuard::new(config));
        chain.push(AuthGuard::new(config));
        chain.push(RoleGuard::new(config));
        chain.push(DependencyGuard::new(config));
        chain
    }

    /// Append a guard after the existing ones
    pub fn push(&mut self, guard: impl RouteGuard + 'static) {
        self.guards.push(Box::new(guard));
    }

    pub fn guard_names(&self) -> Vec<&'static str> {
        self.guards.iter().map(|guard| guard.name()).collect()
    }

    /// Run every guard until one blocks or fails
    pub fn run(&self, request: &GuardRequest<'_>, context: &GuardContext) -> GuardResult {
        for guard in &self.guards {
            match guard.check(request, context) {
                Ok(result) if result.allow => continue,
                Ok(result) => {
                    info!(
                        path = request.path,
                        from = ?request.from,
                        guard = guard.name(),
                        redirect = ?result.redirect_to,
                        reason = %result.reason,
                        "Navigation blocked"
                    );
                    return result;
                }
                Err(e) => {
                    error!(path = request.path, guard = guard.name(), error = %e, "Guard execution failed");
                    return GuardResult::redirect(&self.not_found_path, "Guard execution failed");
                }
            }
        }

        debug!(path = request.path, "All guards passed");
        GuardResult::allow("All guards passed")
    }
}

impl std::fmt::Debug for GuardChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GuardChain")
            .field("guards", &self.guard_names())
            .field("not_found_path", &self.not_found_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn chain() -> GuardChain {
        GuardChain::standard(&GuardConfig::default(), Arc::new(NavigationHistory::default()))
    }

    fn route(value: Value) -> RouteDescriptor {
        RouteDescriptor::from_value(value).unwrap()
    }

    fn run(chain: &GuardChain, route: &RouteDescriptor, context: &GuardContext) -> GuardResult {
        chain.run(&GuardRequest::new(&route.slug, Some(route)), context)
    }

    #[test]
    fn test_standard_order() {
        assert_eq!(
            chain().guard_names(),
            vec!["loop", "enabled", "auth", "role", "dependency"]
        );
    }

    #[test]
    fn test_all_pass() {
        let result = run(&chain(), &route(json!({ "slug": "/" })), &GuardContext::anonymous());
        assert_eq!(result, GuardResult::allow("All guards passed"));
    }

    #[test]
    fn test_auth_required() {
        let dashboard = route(json!({ "slug": "/dashboard", "requiresAuth": true }));
        let result = run(&chain(), &dashboard, &GuardContext::anonymous());

        assert_eq!(result, GuardResult::redirect("/log-in", "Authentication required"));
    }

    #[test]
    fn test_auth_custom_redirect() {
        let page = route(json!({ "slug": "/vault", "requiresAuth": true, "redirectIfNotAuth": "/sign-up" }));
        let result = run(&chain(), &page, &GuardContext::anonymous());
        assert_eq!(result.redirect_to.as_deref(), Some("/sign-up"));
    }

    #[test]
    fn test_already_authenticated() {
        let login = route(json!({ "slug": "/log-in", "redirectIfLoggedIn": "/dashboard" }));

        let result = run(&chain(), &login, &GuardContext::authenticated("fan"));
        assert_eq!(result, GuardResult::redirect("/dashboard", "Already authenticated"));

        let result = run(&chain(), &login, &GuardContext::anonymous());
        assert!(result.allow);
    }

    #[test]
    fn test_role_defaults_to_guest() {
        let page = route(json!({ "slug": "/studio", "supportedRoles": ["creator"] }));
        let result = run(&chain(), &page, &GuardContext::anonymous());

        assert_eq!(result, GuardResult::redirect("/404", "Role guest not authorized"));
    }

    #[test]
    fn test_role_wildcards() {
        let chain = chain();
        for wildcard in ["all", "any"] {
            let page = route(json!({ "slug": format!("/{}", wildcard), "supportedRoles": [wildcard] }));
            assert!(run(&chain, &page, &GuardContext::anonymous()).allow);
        }
    }

    #[test]
    fn test_disabled_reported_before_role() {
        let page = route(json!({ "slug": "/beta", "enabled": false, "supportedRoles": ["admin"] }));
        let result = run(&chain(), &page, &GuardContext::authenticated("fan"));

        assert_eq!(result, GuardResult::redirect("/404", "Route is disabled"));
    }

    #[test]
    fn test_role_dependency() {
        let page = route(json!({
            "slug": "/payouts",
            "dependencies": {
                "roles": {
                    "creator": {
                        "kycPassed": { "required": true, "fallbackSlug": "/kyc" },
                        "bankLinked": { "required": true }
                    }
                }
            }
        }));
        let chain = chain();

        let result = run(&chain, &page, &GuardContext::authenticated("creator"));
        assert_eq!(result, GuardResult::redirect("/kyc", "Missing required dependency: kycPassed"));

        let context = GuardContext::authenticated("creator").with_flag("kycPassed", true);
        let result = run(&chain, &page, &context);
        assert_eq!(
            result,
            GuardResult::redirect("/dashboard", "Missing required dependency: bankLinked")
        );

        // Other roles have no rules
        assert!(run(&chain, &page, &GuardContext::authenticated("fan")).allow);
    }

    #[test]
    fn test_shorthand_dependency_does_not_block() {
        let page = route(json!({
            "slug": "/payouts",
            "dependencies": { "roles": { "creator": { "kycPassed": true } } }
        }));
        let chain = chain();

        let result = run(&chain, &page, &GuardContext::authenticated("creator"));
        assert!(result.allow);
    }

    #[test]
    fn test_onboarding() {
        let page = route(json!({ "slug": "/feed", "dependencies": { "onboardingRequired": true } }));
        let chain = chain();

        let result = run(&chain, &page, &GuardContext::authenticated("fan"));
        assert_eq!(
            result,
            GuardResult::redirect("/sign-up/onboarding", "Onboarding not completed")
        );

        let done = GuardContext::authenticated("fan").with_flag("onboardingPassed", true);
        assert!(run(&chain, &page, &done).allow);
    }

    #[test]
    fn test_flag_must_be_true() {
        let page = route(json!({ "slug": "/feed", "dependencies": { "onboardingRequired": true } }));
        let mut context = GuardContext::authenticated("fan");
        context
            .user_profile
            .insert("onboardingPassed".to_string(), json!("yes"));

        assert!(!run(&chain(), &page, &context).allow);
    }

    #[test]
    fn test_loop_blocks_fourth_attempt() {
        let chain = chain();
        let page = route(json!({ "slug": "/404" }));

        let results: Vec<bool> = (0..5)
            .map(|_| run(&chain, &page, &GuardContext::anonymous()).allow)
            .collect();

        assert_eq!(results, vec![true, true, true, false, false]);
        assert_eq!(
            run(&chain, &page, &GuardContext::anonymous()).reason,
            "Navigation loop detected"
        );
    }

    #[test]
    fn test_missing_route_fails_closed() {
        let result = chain().run(&GuardRequest::new("/nowhere", None), &GuardContext::anonymous());
        assert_eq!(result, GuardResult::redirect("/404", "Guard execution failed"));
    }

    struct Exploding;

    impl RouteGuard for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        fn check(&self, _: &GuardRequest<'_>, _: &GuardContext) -> Result<GuardResult, GuardError> {
            Err(GuardError::Failed {
                guard: "exploding",
                reason: "boom".to_string(),
            })
        }
    }

    #[test]
    fn test_custom_guard_error_fails_closed() {
        let mut chain = chain();
        chain.push(Exploding);

        let result = run(&chain, &route(json!({ "slug": "/" })), &GuardContext::anonymous());
        assert_eq!(result, GuardResult::redirect("/404", "Guard execution failed"));
    }
}
