//! Navigation flow
//!
//! `Navigator` owns one instance of every navigation service and runs a
//! navigation end to end:
//!
//! 1. Resolve the target against the route table (static `redirect` routes
//!    are followed)
//! 2. Apply parent inheritance
//! 3. Run the guard chain
//! 4. On allow: record the active route, push the URL, resolve the locale
//!    and start section preloads and translation loads in the background
//!
//! Background work never delays or fails the navigation result.

use crate::cache::NavCache;
use crate::config::NavConfig;
use crate::environment::{Environment, MemoryEnvironment};
use crate::guard::{GuardChain, GuardContext, GuardRequest, GuardResult};
use crate::history::{ActiveRoute, NavigationHistory};
use crate::locale::LocaleResolver;
use crate::manifest::{FileManifestSource, ManifestLoader, ManifestSource};
use crate::preload::{DocumentHead, PreloadSummary, ResourceTable, SectionPreloader, StaticAssetDir};
use crate::translation::{DirectoryCatalog, TranslationLoader, TranslationSource};
use anyhow::{Context, Result};
use rhtmx_cache::{Clock, SystemClock};
use rhtmx_router::{
    get_all_route_sections_for_route, normalize_path, resolve_section_for_role, split_query,
    PathParams, RouteDescriptor, RouteTable,
};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Static `redirect` routes followed before giving up
const MAX_REDIRECT_HOPS: usize = 5;

/// What happened in the background after an allowed navigation
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackgroundReport {
    pub locale: String,
    pub preload: PreloadSummary,
    /// Section → number of translation keys loaded
    pub translations: BTreeMap<String, usize>,
}

#[derive(Debug)]
pub struct NavigationOutcome {
    pub guard: GuardResult,
    /// Normalized path the guards judged, after static redirects
    pub path: String,
    /// Resolved descriptor after inheritance
    pub route: Option<RouteDescriptor>,
    pub params: PathParams,
    pub locale: Option<String>,
    /// Sections scheduled for preload and translation loading
    pub sections: Vec<String>,
    pub background: Option<JoinHandle<BackgroundReport>>,
}

impl NavigationOutcome {
    fn blocked(path: String, route: Option<RouteDescriptor>, params: PathParams, guard: GuardResult) -> Self {
        Self {
            guard,
            path,
            route,
            params,
            locale: None,
            sections: Vec::new(),
            background: None,
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.guard.allow
    }

    /// Wait for the background loads, if any were started
    pub async fn wait_for_background(self) -> Option<BackgroundReport> {
        let handle = self.background?;
        match handle.await {
            Ok(report) => Some(report),
            Err(e) => {
                warn!(error = %e, "Background navigation work did not complete");
                None
            }
        }
    }
}

/// Composition root for the navigation services
pub struct Navigator {
    config: NavConfig,
    routes: Arc<RouteTable>,
    cache: Arc<NavCache>,
    history: Arc<NavigationHistory>,
    guards: GuardChain,
    locale: Arc<LocaleResolver>,
    manifest: Arc<ManifestLoader>,
    preloader: Arc<SectionPreloader>,
    translations: Arc<TranslationLoader>,
    environment: Arc<dyn Environment>,
}

impl Navigator {
    pub fn builder(config: NavConfig) -> NavigatorBuilder {
        NavigatorBuilder::new(config)
    }

    /// Navigator over the files named in `config`
    ///
    /// The route config must be readable; the manifest, assets and
    /// translations degrade to empty when missing.
    pub fn from_config(config: NavConfig) -> Result<Self> {
        let routes = load_route_table(&config.routes.path)?;
        Ok(Self::builder(config).routes(routes).build())
    }

    /// Navigate from the current active route to `target`
    pub fn navigate(&self, target: &str, context: &GuardContext) -> NavigationOutcome {
        let from = self.history.current_active_path();
        self.navigate_from(target, from.as_deref(), context)
    }

    /// Navigate to `target` on behalf of a user coming from `from`
    pub fn navigate_from(&self, target: &str, from: Option<&str>, context: &GuardContext) -> NavigationOutcome {
        let not_found = &self.config.guards.not_found_path;
        let mut target = target.to_string();
        let mut hops = 0;

        let (route, params) = loop {
            let path = request_path(&target);
            let Some(matched) = self.routes.match_route(&target) else {
                info!(path = %path, "No route for navigation target");
                return NavigationOutcome::blocked(
                    path,
                    None,
                    PathParams::new(),
                    GuardResult::redirect(not_found, "Route not found"),
                );
            };

            match matched.route.redirect.as_deref().filter(|to| !to.is_empty()) {
                Some(to) if hops < MAX_REDIRECT_HOPS => {
                    debug!(from = %path, to, "Following static redirect");
                    target = to.to_string();
                    hops += 1;
                }
                Some(_) => {
                    warn!(path = %path, hops, "Too many static redirects");
                    return NavigationOutcome::blocked(
                        path,
                        None,
                        PathParams::new(),
                        GuardResult::redirect(not_found, "Too many redirects"),
                    );
                }
                None => {
                    let route = self.routes.inherit_configuration_from_parent_route(matched.route);
                    break (route, matched.params);
                }
            }
        };

        let path = request_path(&target);
        let request = GuardRequest::new(&path, Some(&route)).from_path(from);
        let result = self.guards.run(&request, context);
        if !result.allow {
            return NavigationOutcome::blocked(path, Some(route), params, result);
        }

        let role = context.role_or(&self.config.guards.default_role).to_string();
        self.history.set_current_active_route(ActiveRoute {
            path: path.clone(),
            slug: route.slug.clone(),
            params: params.clone(),
            section: resolve_section_for_role(&route, Some(&role)),
        });
        self.environment.push_url(&target);
        let locale = self.locale.resolve_active_locale();

        let sections = if route.preload_exclude {
            debug!(slug = %route.slug, "Route excluded from preloading");
            Vec::new()
        } else {
            get_all_route_sections_for_route(&route, Some(&role))
        };
        let background = self.spawn_background(&sections, &locale);

        info!(
            path = %path,
            slug = %route.slug,
            locale = %locale,
            sections = sections.len(),
            "Navigation allowed"
        );

        NavigationOutcome {
            guard: result,
            path,
            route: Some(route),
            params,
            locale: Some(locale),
            sections,
            background,
        }
    }

    fn spawn_background(&self, sections: &[String], locale: &str) -> Option<JoinHandle<BackgroundReport>> {
        if sections.is_empty() {
            return None;
        }
        let handle = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => {
                warn!(sections = ?sections, "No async runtime, skipping section preload");
                return None;
            }
        };

        let preloader = self.preloader.clone();
        let translations = self.translations.clone();
        let sections = sections.to_vec();
        let locale = locale.to_string();

        Some(handle.spawn(async move {
            let (preload, maps) = tokio::join!(
                preloader.preload_multiple_sections(&sections),
                translations.preload_translations_for_sections(&sections, &locale),
            );
            if !preload.failed.is_empty() {
                warn!(failed = ?preload.failed, "Some section preloads failed");
            }

            BackgroundReport {
                locale,
                preload,
                translations: maps
                    .into_iter()
                    .map(|(section, map)| (section, map.len()))
                    .collect(),
            }
        }))
    }

    pub fn config(&self) -> &NavConfig {
        &self.config
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    pub fn cache(&self) -> &Arc<NavCache> {
        &self.cache
    }

    pub fn history(&self) -> &Arc<NavigationHistory> {
        &self.history
    }

    pub fn guards(&self) -> &GuardChain {
        &self.guards
    }

    pub fn locale(&self) -> &Arc<LocaleResolver> {
        &self.locale
    }

    pub fn manifest(&self) -> &Arc<ManifestLoader> {
        &self.manifest
    }

    pub fn preloader(&self) -> &Arc<SectionPreloader> {
        &self.preloader
    }

    pub fn translations(&self) -> &Arc<TranslationLoader> {
        &self.translations
    }

    pub fn environment(&self) -> &Arc<dyn Environment> {
        &self.environment
    }
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("routes", &self.routes.len())
            .field("guards", &self.guards.guard_names())
            .field("current", &self.history.current_active_path())
            .finish()
    }
}

/// Assembles a `Navigator`, defaulting every capability from the config
pub struct NavigatorBuilder {
    config: NavConfig,
    routes: RouteTable,
    manifest_source: Option<Arc<dyn ManifestSource>>,
    resources: Option<Arc<dyn ResourceTable>>,
    translation_source: Option<Arc<dyn TranslationSource>>,
    environment: Option<Arc<dyn Environment>>,
    clock: Option<Arc<dyn Clock>>,
}

impl NavigatorBuilder {
    pub fn new(config: NavConfig) -> Self {
        Self {
            config,
            routes: RouteTable::default(),
            manifest_source: None,
            resources: None,
            translation_source: None,
            environment: None,
            clock: None,
        }
    }

    pub fn routes(mut self, routes: RouteTable) -> Self {
        self.routes = routes;
        self
    }

    pub fn manifest_source(mut self, source: Arc<dyn ManifestSource>) -> Self {
        self.manifest_source = Some(source);
        self
    }

    pub fn resources(mut self, resources: Arc<dyn ResourceTable>) -> Self {
        self.resources = Some(resources);
        self
    }

    pub fn translation_source(mut self, source: Arc<dyn TranslationSource>) -> Self {
        self.translation_source = Some(source);
        self
    }

    pub fn environment(mut self, environment: Arc<dyn Environment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn build(self) -> Navigator {
        let config = self.config;
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let environment = self
            .environment
            .unwrap_or_else(|| Arc::new(MemoryEnvironment::default()));

        let cache = Arc::new(NavCache::with_clock(clock.clone()));
        let history = Arc::new(NavigationHistory::with_clock(
            config.history.max_visits,
            config.history.max_attempts,
            clock.clone(),
        ));
        let guards = GuardChain::standard(&config.guards, history.clone());

        let locale = Arc::new(LocaleResolver::new(
            config.locale.clone(),
            cache.clone(),
            environment.clone(),
        ));

        let manifest_source = self
            .manifest_source
            .unwrap_or_else(|| Arc::new(FileManifestSource::new(&config.manifest.path)));
        let manifest = Arc::new(ManifestLoader::new(manifest_source, config.manifest.mode));

        let resources = self.resources.unwrap_or_else(|| {
            Arc::new(DocumentHead::new(Arc::new(StaticAssetDir::from_config(&config.preload))))
        });
        let preloader = Arc::new(
            SectionPreloader::new(manifest.clone(), resources, cache.clone(), &config.preload)
                .with_clock(clock),
        );

        let translation_source = self
            .translation_source
            .unwrap_or_else(|| Arc::new(DirectoryCatalog::from_config(&config.translations)));
        let translations = Arc::new(TranslationLoader::new(
            translation_source,
            cache.clone(),
            &config.translations,
        ));

        info!(
            routes = self.routes.len(),
            guards = ?guards.guard_names(),
            "Navigator ready"
        );

        Navigator {
            config,
            routes: Arc::new(self.routes),
            cache,
            history,
            guards,
            locale,
            manifest,
            preloader,
            translations,
            environment,
        }
    }
}

/// Read a JSON route config file into a route table
///
/// Individual malformed routes are skipped; an unreadable file or invalid
/// JSON is an error.
pub fn load_route_table(path: impl AsRef<Path>) -> Result<RouteTable> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read route config: {}", path.display()))?;
    let value: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Failed to parse route config: {}", path.display()))?;
    Ok(RouteTable::from_value(value))
}

fn request_path(target: &str) -> String {
    let (path, _) = split_query(target);
    normalize_path(path).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ManifestMode;
    use crate::manifest::StaticManifestSource;
    use crate::preload::{AssetLoader, PreloadLink};
    use crate::translation::MemoryCatalog;
    use crate::error::LoadResult;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    struct InstantAssets;

    #[async_trait]
    impl AssetLoader for InstantAssets {
        async fn load(&self, _link: &PreloadLink) -> LoadResult<()> {
            Ok(())
        }
    }

    const ROUTES: &str = r#"[
        { "slug": "/", "componentPath": "Home", "section": "home" },
        { "slug": "/home", "redirect": "/" },
        { "slug": "/loop-a", "redirect": "/loop-b" },
        { "slug": "/loop-b", "redirect": "/loop-a" },
        { "slug": "/feed", "section": "feed", "preLoadSections": ["profile"], "supportedRoles": ["all"] },
        { "slug": "/settings", "section": "settings", "requiresAuth": true, "preloadExclude": true },
        { "slug": "/settings/privacy", "componentPath": "Privacy", "inheritConfigFromParent": true },
        { "slug": "/404", "componentPath": "NotFound" }
    ]"#;

    fn navigator() -> (Navigator, Arc<DocumentHead>, Arc<MemoryEnvironment>) {
        let mut config = NavConfig::default();
        config.manifest.mode = ManifestMode::Production;

        let head = Arc::new(DocumentHead::new(Arc::new(InstantAssets)));
        let env = Arc::new(MemoryEnvironment::new("/"));
        let catalog = MemoryCatalog::new()
            .with_unit("feed", "en", [("title", "Feed")])
            .with_unit("profile", "en", [("title", "Profile"), ("bio", "Bio")]);

        let navigator = Navigator::builder(config)
            .routes(RouteTable::from_json_str(ROUTES))
            .manifest_source(Arc::new(StaticManifestSource::new(
                r#"{ "feed": { "js": "/feed.js", "css": "/feed.css" }, "profile": "/profile.js" }"#,
            )))
            .resources(head.clone())
            .translation_source(Arc::new(catalog))
            .environment(env.clone())
            .build();
        (navigator, head, env)
    }

    #[tokio::test]
    async fn test_allowed_navigation_runs_background_work() {
        let (navigator, head, env) = navigator();

        let outcome = navigator.navigate("/feed?tab=new", &GuardContext::authenticated("fan"));
        assert!(outcome.is_allowed());
        assert_eq!(outcome.path, "/feed");
        assert_eq!(outcome.sections, vec!["feed", "profile"]);
        assert_eq!(outcome.locale.as_deref(), Some("en"));
        assert_eq!(env.current_url(), "/feed?tab=new");
        assert_eq!(navigator.history().current_active_path().as_deref(), Some("/feed"));

        let report = outcome.wait_for_background().await.unwrap();
        assert_eq!(report.preload.successful, vec!["feed", "profile"]);
        assert_eq!(report.translations.get("profile"), Some(&2));
        assert_eq!(head.links().len(), 3);
        assert!(navigator.translations().are_translations_loaded_for_section("feed", "en"));
    }

    #[tokio::test]
    async fn test_unknown_route() {
        let mut config = NavConfig::default();
        config.guards.not_found_path = "/missing".to_string();
        let navigator = Navigator::builder(config)
            .translation_source(Arc::new(MemoryCatalog::new()))
            .build();

        let outcome = navigator.navigate("/anything", &GuardContext::anonymous());
        assert_eq!(outcome.guard, GuardResult::redirect("/missing", "Route not found"));
        assert!(outcome.route.is_none());
    }

    #[tokio::test]
    async fn test_static_redirect_followed() {
        let (navigator, _, _) = navigator();

        let outcome = navigator.navigate("/home", &GuardContext::anonymous());
        assert!(outcome.is_allowed());
        assert_eq!(outcome.path, "/");
        assert_eq!(outcome.route.map(|r| r.slug), Some("/".to_string()));
    }

    #[tokio::test]
    async fn test_redirect_cycle_stops() {
        let (navigator, _, _) = navigator();

        let outcome = navigator.navigate("/loop-a", &GuardContext::anonymous());
        assert_eq!(outcome.guard, GuardResult::redirect("/404", "Too many redirects"));
    }

    #[tokio::test]
    async fn test_blocked_navigation_records_nothing() {
        let (navigator, _, env) = navigator();

        let outcome = navigator.navigate("/settings", &GuardContext::anonymous());
        assert_eq!(outcome.guard.redirect_to.as_deref(), Some("/log-in"));
        assert!(outcome.background.is_none());
        assert!(navigator.history().current_active_route().is_none());
        assert!(env.pushed_urls().is_empty());
    }

    #[tokio::test]
    async fn test_inherited_child_and_preload_exclude() {
        let (navigator, head, _) = navigator();

        let anonymous = navigator.navigate("/settings/privacy", &GuardContext::anonymous());
        assert_eq!(anonymous.guard.reason, "Authentication required");

        let outcome = navigator.navigate("/settings/privacy", &GuardContext::authenticated("fan"));
        let route = outcome.route.as_ref().unwrap();
        assert!(route.requires_auth);
        assert!(route.preload_exclude);
        assert!(outcome.sections.is_empty());
        assert!(outcome.background.is_none());
        assert!(head.links().is_empty());
    }

    #[test]
    fn test_no_runtime_skips_background() {
        let (navigator, _, _) = navigator();

        let outcome = navigator.navigate("/feed", &GuardContext::anonymous());
        assert!(outcome.is_allowed());
        assert_eq!(outcome.sections.len(), 2);
        assert!(outcome.background.is_none());
    }

    #[test]
    fn test_load_route_table() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("routes.json");
        std::fs::write(&path, ROUTES).unwrap();

        assert_eq!(load_route_table(&path).unwrap().len(), 8);
        assert!(load_route_table(dir.path().join("nope.json")).is_err());
    }
}
