//! Locale resolution
//!
//! The active locale comes from the first source that yields a supported
//! code:
//!
//! 1. URL: `locale` query parameter, then the first path segment (`/vi/feed`)
//! 2. The user's cached manual choice
//! 3. The platform's preferred language, base subtag only
//! 4. The configured default

use crate::cache::{CachedValue, NavCache};
use crate::config::LocaleConfig;
use crate::environment::{query_param, with_query_param, Environment};
use parking_lot::Mutex;
use rhtmx_router::split_query;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LocaleSource {
    Url,
    Cache,
    Browser,
    Default,
}

/// One entry of the resolution chain with its current value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocalePreference {
    pub source: LocaleSource,
    pub value: Option<String>,
    pub priority: u8,
}

pub struct LocaleResolver {
    config: LocaleConfig,
    cache: Arc<NavCache>,
    environment: Arc<dyn Environment>,
    active: Mutex<Option<String>>,
}

impl LocaleResolver {
    pub fn new(config: LocaleConfig, cache: Arc<NavCache>, environment: Arc<dyn Environment>) -> Self {
        Self {
            config,
            cache,
            environment,
            active: Mutex::new(None),
        }
    }

    /// Walk the resolution chain and make the result active
    pub fn resolve_active_locale(&self) -> String {
        let (source, locale) = self.first_match();
        debug!(?source, locale = %locale, "Active locale resolved");
        *self.active.lock() = Some(locale.clone());
        locale
    }

    /// Active locale, resolving it on first use
    pub fn active_locale(&self) -> String {
        if let Some(locale) = self.active.lock().clone() {
            return locale;
        }
        self.resolve_active_locale()
    }

    /// Make `code` active and remember it
    ///
    /// Returns `false` for unsupported codes. With `update_url` the current
    /// URL gets a `locale` query parameter pushed without reload.
    pub fn set_active_locale(&self, code: &str, update_url: bool) -> bool {
        if !self.is_locale_supported(code) {
            warn!(code, supported = ?self.config.supported, "Unsupported locale");
            return false;
        }

        *self.active.lock() = Some(code.to_string());
        self.cache.set(
            &self.config.cache_key,
            CachedValue::Locale(code.to_string()),
            self.config.preference_ttl_ms,
        );

        if update_url {
            let url = with_query_param(
                &self.environment.current_url(),
                &self.config.query_param,
                code,
            );
            self.environment.push_url(&url);
        }

        info!(code, update_url, "Active locale set");
        true
    }

    pub fn switch_to_locale(&self, code: &str) -> bool {
        let previous = self.active.lock().clone();
        let switched = self.set_active_locale(code, true);
        if switched {
            debug!(from = ?previous, to = code, "Locale switched");
        }
        switched
    }

    pub fn reset_locale_to_default(&self) -> bool {
        let default = self.config.default.clone();
        self.set_active_locale(&default, true)
    }

    /// Every source with its current value, highest priority first
    pub fn get_locale_preference_order(&self) -> Vec<LocalePreference> {
        vec![
            LocalePreference {
                source: LocaleSource::Url,
                value: self.locale_from_url(),
                priority: 1,
            },
            LocalePreference {
                source: LocaleSource::Cache,
                value: self.cached_locale(),
                priority: 2,
            },
            LocalePreference {
                source: LocaleSource::Browser,
                value: self.browser_locale(),
                priority: 3,
            },
            LocalePreference {
                source: LocaleSource::Default,
                value: Some(self.config.default.clone()),
                priority: 4,
            },
        ]
    }

    pub fn supported_locales(&self) -> &[String] {
        &self.config.supported
    }

    pub fn is_locale_supported(&self, code: &str) -> bool {
        self.config.supported.iter().any(|supported| supported == code)
    }

    pub fn default_locale(&self) -> &str {
        &self.config.default
    }

    /// Human-readable name, or the code itself when unknown
    pub fn locale_display_name(&self, code: &str) -> String {
        self.config
            .display_names
            .get(code)
            .cloned()
            .unwrap_or_else(|| code.to_string())
    }

    fn first_match(&self) -> (LocaleSource, String) {
        if let Some(locale) = self.locale_from_url() {
            return (LocaleSource::Url, locale);
        }
        if let Some(locale) = self.cached_locale() {
            return (LocaleSource::Cache, locale);
        }
        if let Some(locale) = self.browser_locale() {
            return (LocaleSource::Browser, locale);
        }
        (LocaleSource::Default, self.config.default.clone())
    }

    fn locale_from_url(&self) -> Option<String> {
        let url = self.environment.current_url();
        let (path, query) = split_query(&url);

        if let Some(code) = query.and_then(|query| query_param(query, &self.config.query_param)) {
            if self.is_locale_supported(&code) {
                return Some(code);
            }
        }

        path.split('/')
            .find(|segment| !segment.is_empty())
            .filter(|segment| self.is_locale_supported(segment))
            .map(str::to_string)
    }

    fn cached_locale(&self) -> Option<String> {
        self.cache
            .get(&self.config.cache_key)
            .and_then(|value| value.as_locale().map(str::to_string))
            .filter(|code| self.is_locale_supported(code))
    }

    fn browser_locale(&self) -> Option<String> {
        let language = self.environment.preferred_language()?;
        let base = language.split(['-', '_']).next()?.to_lowercase();
        if self.is_locale_supported(&base) {
            Some(base)
        } else {
            debug!(language = %language, "Preferred language not supported");
            None
        }
    }
}

impl std::fmt::Debug for LocaleResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocaleResolver")
            .field("supported", &self.config.supported)
            .field("active", &*self.active.lock())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::MemoryEnvironment;
    use pretty_assertions::assert_eq;
    use rhtmx_cache::ManualClock;
    use std::time::Duration;

    fn setup(env: MemoryEnvironment) -> (LocaleResolver, Arc<MemoryEnvironment>, Arc<NavCache>) {
        let env = Arc::new(env);
        let cache = Arc::new(NavCache::new());
        let resolver = LocaleResolver::new(LocaleConfig::default(), cache.clone(), env.clone());
        (resolver, env, cache)
    }

    #[test]
    fn test_default_when_nothing_else() {
        let (resolver, _, _) = setup(MemoryEnvironment::new("/feed"));
        assert_eq!(resolver.resolve_active_locale(), "en");
    }

    #[test]
    fn test_query_beats_everything() {
        let (resolver, _, _) = setup(MemoryEnvironment::new("/vi/feed?locale=en").with_language("vi"));
        resolver.set_active_locale("vi", false);

        assert_eq!(resolver.resolve_active_locale(), "en");
    }

    #[test]
    fn test_path_segment() {
        let (resolver, _, _) = setup(MemoryEnvironment::new("/vi/feed"));
        assert_eq!(resolver.resolve_active_locale(), "vi");
    }

    #[test]
    fn test_unsupported_query_falls_through_to_path() {
        let (resolver, _, _) = setup(MemoryEnvironment::new("/vi?locale=fr"));
        assert_eq!(resolver.resolve_active_locale(), "vi");
    }

    #[test]
    fn test_browser_base_subtag() {
        let (resolver, _, _) = setup(MemoryEnvironment::new("/").with_language("VI-vn"));
        assert_eq!(resolver.resolve_active_locale(), "vi");

        let (resolver, _, _) = setup(MemoryEnvironment::new("/").with_language("fr-FR"));
        assert_eq!(resolver.resolve_active_locale(), "en");
    }

    #[test]
    fn test_set_then_resolve() {
        let (resolver, env, _) = setup(MemoryEnvironment::new("/feed"));

        assert!(resolver.set_active_locale("vi", false));
        assert!(env.pushed_urls().is_empty());
        assert_eq!(resolver.resolve_active_locale(), "vi");
    }

    #[test]
    fn test_set_pushes_url() {
        let (resolver, env, _) = setup(MemoryEnvironment::new("/feed?tab=new"));

        assert!(resolver.switch_to_locale("vi"));
        assert_eq!(env.pushed_urls(), vec!["/feed?tab=new&locale=vi"]);
        assert_eq!(resolver.active_locale(), "vi");
    }

    #[test]
    fn test_reject_unsupported() {
        let (resolver, env, cache) = setup(MemoryEnvironment::new("/"));

        assert!(!resolver.set_active_locale("de", true));
        assert!(env.pushed_urls().is_empty());
        assert!(cache.is_empty());
    }

    #[test]
    fn test_choice_expires_after_ninety_days() {
        let clock = Arc::new(ManualClock::starting_now());
        let cache = Arc::new(NavCache::with_clock(clock.clone()));
        let env = Arc::new(MemoryEnvironment::new("/"));
        let resolver = LocaleResolver::new(LocaleConfig::default(), cache, env);

        resolver.set_active_locale("vi", false);
        clock.advance(Duration::from_secs(89 * 24 * 3600));
        assert_eq!(resolver.resolve_active_locale(), "vi");

        clock.advance(Duration::from_secs(2 * 24 * 3600));
        assert_eq!(resolver.resolve_active_locale(), "en");
    }

    #[test]
    fn test_preference_order() {
        let (resolver, _, _) = setup(MemoryEnvironment::new("/vi/feed").with_language("en-GB"));
        resolver.set_active_locale("en", false);

        let order = resolver.get_locale_preference_order();
        let values: Vec<(LocaleSource, Option<&str>, u8)> = order
            .iter()
            .map(|p| (p.source, p.value.as_deref(), p.priority))
            .collect();

        assert_eq!(
            values,
            vec![
                (LocaleSource::Url, Some("vi"), 1),
                (LocaleSource::Cache, Some("en"), 2),
                (LocaleSource::Browser, Some("en"), 3),
                (LocaleSource::Default, Some("en"), 4),
            ]
        );
    }

    #[test]
    fn test_display_names() {
        let (resolver, _, _) = setup(MemoryEnvironment::default());
        assert_eq!(resolver.locale_display_name("vi"), "Tiếng Việt");
        assert_eq!(resolver.locale_display_name("xx"), "xx");
        assert_eq!(resolver.default_locale(), "en");
        assert_eq!(resolver.supported_locales().to_vec(), vec!["en", "vi"]);
    }

    #[test]
    fn test_reset_to_default() {
        let (resolver, _, _) = setup(MemoryEnvironment::default());
        resolver.set_active_locale("vi", false);

        assert!(resolver.reset_locale_to_default());
        assert_eq!(resolver.active_locale(), "en");
    }
}
