// File: rhtmx-nav/src/config.rs
// Purpose: Navigation runtime configuration parsed from rhtmx-nav.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// Navigation runtime configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct NavConfig {
    #[serde(default)]
    pub routes: RoutesConfig,

    #[serde(default)]
    pub locale: LocaleConfig,

    #[serde(default)]
    pub guards: GuardConfig,

    #[serde(default)]
    pub history: HistoryConfig,

    #[serde(default)]
    pub preload: PreloadConfig,

    #[serde(default)]
    pub translations: TranslationConfig,

    #[serde(default)]
    pub manifest: ManifestConfig,
}

/// Route table location
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutesConfig {
    #[serde(default = "default_routes_path")]
    pub path: String,
}

/// Locale resolution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocaleConfig {
    #[serde(default = "default_supported_locales")]
    pub supported: Vec<String>,

    #[serde(default = "default_locale")]
    pub default: String,

    /// Query parameter carrying an explicit locale (`?locale=vi`)
    #[serde(default = "default_locale_query_param")]
    pub query_param: String,

    /// Cache key for the user's manual choice
    #[serde(default = "default_locale_cache_key")]
    pub cache_key: String,

    /// How long a manual choice is remembered (default: 90 days)
    #[serde(default = "default_locale_preference_ttl_ms")]
    pub preference_ttl_ms: i64,

    #[serde(default = "default_display_names")]
    pub display_names: BTreeMap<String, String>,
}

/// Guard chain thresholds and fallback paths
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuardConfig {
    #[serde(default = "default_not_found_path")]
    pub not_found_path: String,

    #[serde(default = "default_login_path")]
    pub login_path: String,

    /// Fallback for a missing role-specific dependency without its own
    #[serde(default = "default_dependency_fallback")]
    pub dependency_fallback: String,

    #[serde(default = "default_onboarding_fallback")]
    pub onboarding_fallback: String,

    /// Role assumed when the auth context carries none
    #[serde(default = "default_role")]
    pub default_role: String,

    /// Number of previous attempts inspected for loops
    #[serde(default = "default_loop_window")]
    pub loop_window: usize,

    /// Repeats within the window that count as a loop
    #[serde(default = "default_loop_threshold")]
    pub loop_threshold: usize,
}

/// History buffer sizes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    #[serde(default = "default_max_visits")]
    pub max_visits: usize,

    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,
}

/// Section preloading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreloadConfig {
    /// TTL of the informational preload record (default: 2 hours)
    #[serde(default = "default_preload_record_ttl_ms")]
    pub record_ttl_ms: i64,

    /// Build output directory holding section bundles
    #[serde(default = "default_asset_dir")]
    pub asset_dir: String,
}

/// Translation loading
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationConfig {
    /// Directory containing `section-<name>/<locale>.json` units
    #[serde(default = "default_translation_dir")]
    pub dir: String,

    /// Locale every other locale is merged over
    #[serde(default = "default_locale")]
    pub base_locale: String,

    /// Merged map TTL (default: 1 hour)
    #[serde(default = "default_translation_ttl_ms")]
    pub ttl_ms: i64,

    /// Ceiling for waiting on another caller's load
    #[serde(default = "default_wait_timeout_ms")]
    pub wait_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ManifestMode {
    #[default]
    Production,
    /// Bundles are served unbundled; the manifest is always empty
    Development,
}

/// Section manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManifestConfig {
    #[serde(default)]
    pub mode: ManifestMode,

    #[serde(default = "default_manifest_path")]
    pub path: String,
}

// Default values
fn default_routes_path() -> String {
    "config/routes.json".to_string()
}

fn default_supported_locales() -> Vec<String> {
    vec!["en".to_string(), "vi".to_string()]
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_locale_query_param() -> String {
    "locale".to_string()
}

fn default_locale_cache_key() -> String {
    "user_locale_preference".to_string()
}

fn default_locale_preference_ttl_ms() -> i64 {
    90 * 24 * 60 * 60 * 1000
}

fn default_display_names() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("en".to_string(), "English".to_string()),
        ("vi".to_string(), "Tiếng Việt".to_string()),
    ])
}

fn default_not_found_path() -> String {
    "/404".to_string()
}

fn default_login_path() -> String {
    "/log-in".to_string()
}

fn default_dependency_fallback() -> String {
    "/dashboard".to_string()
}

fn default_onboarding_fallback() -> String {
    "/sign-up/onboarding".to_string()
}

fn default_role() -> String {
    "guest".to_string()
}

fn default_loop_window() -> usize {
    5
}

fn default_loop_threshold() -> usize {
    3
}

fn default_max_visits() -> usize {
    100
}

fn default_max_attempts() -> usize {
    50
}

fn default_preload_record_ttl_ms() -> i64 {
    2 * 60 * 60 * 1000
}

fn default_asset_dir() -> String {
    "dist".to_string()
}

fn default_translation_dir() -> String {
    "i18n".to_string()
}

fn default_translation_ttl_ms() -> i64 {
    60 * 60 * 1000
}

fn default_wait_timeout_ms() -> u64 {
    5000
}

fn default_manifest_path() -> String {
    "dist/section-manifest.json".to_string()
}

// Default implementations
impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            path: default_routes_path(),
        }
    }
}

impl Default for LocaleConfig {
    fn default() -> Self {
        Self {
            supported: default_supported_locales(),
            default: default_locale(),
            query_param: default_locale_query_param(),
            cache_key: default_locale_cache_key(),
            preference_ttl_ms: default_locale_preference_ttl_ms(),
            display_names: default_display_names(),
        }
    }
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            not_found_path: default_not_found_path(),
            login_path: default_login_path(),
            dependency_fallback: default_dependency_fallback(),
            onboarding_fallback: default_onboarding_fallback(),
            default_role: default_role(),
            loop_window: default_loop_window(),
            loop_threshold: default_loop_threshold(),
        }
    }
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            max_visits: default_max_visits(),
            max_attempts: default_max_attempts(),
        }
    }
}

impl Default for PreloadConfig {
    fn default() -> Self {
        Self {
            record_ttl_ms: default_preload_record_ttl_ms(),
            asset_dir: default_asset_dir(),
        }
    }
}

impl Default for TranslationConfig {
    fn default() -> Self {
        Self {
            dir: default_translation_dir(),
            base_locale: default_locale(),
            ttl_ms: default_translation_ttl_ms(),
            wait_timeout_ms: default_wait_timeout_ms(),
        }
    }
}

impl Default for ManifestConfig {
    fn default() -> Self {
        Self {
            mode: ManifestMode::Production,
            path: default_manifest_path(),
        }
    }
}

impl NavConfig {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Missing or empty file means defaults
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: NavConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        Ok(config)
    }

    /// Load configuration from ./rhtmx-nav.toml
    pub fn load_default() -> Result<Self> {
        Self::load("rhtmx-nav.toml")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = NavConfig::default();
        assert_eq!(config.locale.supported, vec!["en", "vi"]);
        assert_eq!(config.locale.preference_ttl_ms, 7_776_000_000);
        assert_eq!(config.guards.not_found_path, "/404");
        assert_eq!(config.guards.login_path, "/log-in");
        assert_eq!(config.guards.loop_window, 5);
        assert_eq!(config.guards.loop_threshold, 3);
        assert_eq!(config.history.max_visits, 100);
        assert_eq!(config.history.max_attempts, 50);
        assert_eq!(config.preload.record_ttl_ms, 7_200_000);
        assert_eq!(config.translations.ttl_ms, 3_600_000);
        assert_eq!(config.manifest.mode, ManifestMode::Production);
    }

    #[test]
    fn test_empty_config() {
        let config = toml::from_str::<NavConfig>("").unwrap_or_default();
        assert_eq!(config.locale.default, "en");
        assert_eq!(config.translations.wait_timeout_ms, 5000);
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [locale]
            supported = ["en", "vi", "fr"]

            [guards]
            login_path = "/sign-in"
            loop_threshold = 4

            [manifest]
            mode = "development"
        "#;
        let config: NavConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.locale.supported.len(), 3);
        assert_eq!(config.locale.default, "en");
        assert_eq!(config.guards.login_path, "/sign-in");
        assert_eq!(config.guards.loop_threshold, 4);
        assert_eq!(config.guards.loop_window, 5);
        assert_eq!(config.manifest.mode, ManifestMode::Development);
    }

    #[test]
    fn test_load_missing_file() {
        let config = NavConfig::load("/definitely/not/here/rhtmx-nav.toml").unwrap();
        assert_eq!(config.guards.default_role, "guest");
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[history]\nmax_visits = 10").unwrap();

        let config = NavConfig::load(file.path()).unwrap();
        assert_eq!(config.history.max_visits, 10);
        assert_eq!(config.history.max_attempts, 50);
    }

    #[test]
    fn test_load_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[history\nmax_visits = ").unwrap();

        let err = NavConfig::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
