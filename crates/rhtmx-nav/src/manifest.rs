//! Section manifest loading
//!
//! The build emits `section-manifest.json`, mapping each section to its
//! script and style bundles:
//!
//! ```json
//! {
//!   "feed":    { "js": "/assets/feed-3f2a.js", "css": "/assets/feed-91bc.css", "size": 48213, "timestamp": "2025-01-04T10:00:00Z" },
//!   "profile": "/assets/profile-77d0.js"
//! }
//! ```
//!
//! The string form is the legacy script-only shape. A manifest that fails to
//! load is treated as empty and refetched on the next call.

use crate::config::{ManifestConfig, ManifestMode};
use crate::error::{LoadError, LoadResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Where the manifest text comes from
#[async_trait]
pub trait ManifestSource: Send + Sync {
    async fn fetch(&self) -> LoadResult<String>;
}

/// Manifest read from the build output directory
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl ManifestSource for FileManifestSource {
    async fn fetch(&self) -> LoadResult<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| LoadError::io(self.path.display().to_string(), e))
    }
}

/// Manifest held in memory
#[derive(Debug, Clone, Default)]
pub struct StaticManifestSource {
    body: String,
}

impl StaticManifestSource {
    pub fn new(body: impl Into<String>) -> Self {
        Self { body: body.into() }
    }
}

#[async_trait]
impl ManifestSource for StaticManifestSource {
    async fn fetch(&self) -> LoadResult<String> {
        Ok(self.body.clone())
    }
}

/// One manifest entry in either accepted shape
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ManifestEntry {
    Legacy(String),
    Bundle {
        #[serde(default)]
        js: Option<String>,
        /// Older alias for `js`
        #[serde(default)]
        path: Option<String>,
        #[serde(default)]
        css: Option<String>,
        #[serde(default)]
        size: Option<u64>,
        #[serde(default)]
        timestamp: Option<String>,
    },
}

impl ManifestEntry {
    pub fn bundle_paths(&self) -> BundlePaths {
        match self {
            ManifestEntry::Legacy(script) => BundlePaths {
                script: non_empty(Some(script)),
                style: None,
            },
            ManifestEntry::Bundle { js, path, css, .. } => BundlePaths {
                script: non_empty(js.as_ref()).or_else(|| non_empty(path.as_ref())),
                style: non_empty(css.as_ref()),
            },
        }
    }

    pub fn size_bytes(&self) -> u64 {
        match self {
            ManifestEntry::Bundle { size, .. } => size.unwrap_or(0),
            ManifestEntry::Legacy(_) => 0,
        }
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        match self {
            ManifestEntry::Bundle {
                timestamp: Some(ts),
                ..
            } => DateTime::parse_from_rfc3339(ts)
                .ok()
                .map(|dt| dt.with_timezone(&Utc)),
            _ => None,
        }
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Script and style bundle for one section
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BundlePaths {
    pub script: Option<String>,
    pub style: Option<String>,
}

/// Parsed section manifest
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Manifest {
    sections: BTreeMap<String, ManifestEntry>,
}

impl Manifest {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse manifest JSON
    ///
    /// The top level must be an object. Entries of an unknown shape are
    /// skipped with a warning.
    pub fn from_json_str(text: &str) -> Result<Self, serde_json::Error> {
        let raw: BTreeMap<String, Value> = serde_json::from_str(text)?;
        let sections = raw
            .into_iter()
            .filter_map(|(section, value)| match serde_json::from_value(value) {
                Ok(entry) => Some((section, entry)),
                Err(e) => {
                    warn!(section = %section, error = %e, "Skipping malformed manifest entry");
                    None
                }
            })
            .collect();
        Ok(Self { sections })
    }

    pub fn from_entries(entries: impl IntoIterator<Item = (String, ManifestEntry)>) -> Self {
        Self {
            sections: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, section: &str) -> Option<&ManifestEntry> {
        self.sections.get(section)
    }

    pub fn bundle_paths(&self, section: &str) -> Option<BundlePaths> {
        self.get(section).map(ManifestEntry::bundle_paths)
    }

    pub fn sections(&self) -> impl Iterator<Item = &str> {
        self.sections.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.sections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn total_size_bytes(&self) -> u64 {
        self.sections.values().map(ManifestEntry::size_bytes).sum()
    }
}

/// Loads the manifest once and keeps it for the life of the process
pub struct ManifestLoader {
    source: Arc<dyn ManifestSource>,
    mode: ManifestMode,
    cached: Mutex<Option<Arc<Manifest>>>,
}

impl ManifestLoader {
    pub fn new(source: Arc<dyn ManifestSource>, mode: ManifestMode) -> Self {
        Self {
            source,
            mode,
            cached: Mutex::new(None),
        }
    }

    /// File-backed loader from configuration
    pub fn from_config(config: &ManifestConfig) -> Self {
        Self::new(Arc::new(FileManifestSource::new(&config.path)), config.mode)
    }

    /// Return the manifest, fetching it on first use
    ///
    /// Never fails: fetch or parse errors yield an empty manifest that is
    /// not cached.
    pub async fn load(&self) -> Arc<Manifest> {
        if let Some(manifest) = self.cached.lock().clone() {
            debug!(sections = manifest.len(), "Manifest cache hit");
            return manifest;
        }

        if self.mode == ManifestMode::Development {
            debug!("Development mode, using empty manifest");
            let manifest = Arc::new(Manifest::empty());
            *self.cached.lock() = Some(manifest.clone());
            return manifest;
        }

        let text = match self.source.fetch().await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, "Failed to fetch section manifest");
                return Arc::new(Manifest::empty());
            }
        };

        match Manifest::from_json_str(&text) {
            Ok(manifest) => {
                info!(sections = manifest.len(), "Section manifest loaded");
                let manifest = Arc::new(manifest);
                *self.cached.lock() = Some(manifest.clone());
                manifest
            }
            Err(e) => {
                warn!(error = %e, "Section manifest is not valid JSON");
                Arc::new(Manifest::empty())
            }
        }
    }

    /// Bundle paths for `section`, loading the manifest unless one is given
    pub async fn resolve_bundle_paths(
        &self,
        section: &str,
        manifest: Option<&Manifest>,
    ) -> Option<BundlePaths> {
        let paths = match manifest {
            Some(manifest) => manifest.bundle_paths(section),
            None => self.load().await.bundle_paths(section),
        };
        if paths.is_none() {
            debug!(section, "Section not in manifest");
        }
        paths
    }

    pub fn is_loaded(&self) -> bool {
        self.cached.lock().is_some()
    }

    /// Forget the cached manifest so the next load refetches
    pub fn clear_cache(&self) {
        *self.cached.lock() = None;
        debug!("Manifest cache cleared");
    }
}

impl std::fmt::Debug for ManifestLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestLoader")
            .field("mode", &self.mode)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MANIFEST: &str = r#"{
        "feed": { "js": "/assets/feed.js", "css": "/assets/feed.css", "size": 1200, "timestamp": "2025-01-04T10:00:00Z" },
        "profile": "/assets/profile.js",
        "legacy": { "path": "/assets/legacy.js" },
        "broken": 42
    }"#;

    struct CountingSource {
        body: Mutex<LoadResult<String>>,
        fetches: AtomicUsize,
    }

    impl CountingSource {
        fn new(body: LoadResult<String>) -> Self {
            Self {
                body: Mutex::new(body),
                fetches: AtomicUsize::new(0),
            }
        }

        fn set_body(&self, body: &str) {
            *self.body.lock() = Ok(body.to_string());
        }
    }

    #[async_trait]
    impl ManifestSource for CountingSource {
        async fn fetch(&self) -> LoadResult<String> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            match &*self.body.lock() {
                Ok(body) => Ok(body.clone()),
                Err(_) => Err(LoadError::NotFound("section-manifest.json".to_string())),
            }
        }
    }

    #[test]
    fn test_entry_shapes() {
        let manifest = Manifest::from_json_str(MANIFEST).unwrap();

        assert_eq!(manifest.len(), 3);
        assert_eq!(
            manifest.bundle_paths("feed"),
            Some(BundlePaths {
                script: Some("/assets/feed.js".to_string()),
                style: Some("/assets/feed.css".to_string()),
            })
        );
        assert_eq!(
            manifest.bundle_paths("profile"),
            Some(BundlePaths {
                script: Some("/assets/profile.js".to_string()),
                style: None,
            })
        );
        assert_eq!(
            manifest.bundle_paths("legacy").and_then(|p| p.script),
            Some("/assets/legacy.js".to_string())
        );
        assert_eq!(manifest.bundle_paths("missing"), None);
        assert_eq!(manifest.total_size_bytes(), 1200);
        assert!(manifest.get("feed").unwrap().last_modified().is_some());
    }

    #[test]
    fn test_not_an_object() {
        assert!(Manifest::from_json_str("[1, 2]").is_err());
    }

    #[tokio::test]
    async fn test_loaded_once() {
        let source = Arc::new(CountingSource::new(Ok(MANIFEST.to_string())));
        let loader = ManifestLoader::new(source.clone(), ManifestMode::Production);

        loader.load().await;
        loader.load().await;
        assert!(loader.resolve_bundle_paths("feed", None).await.is_some());

        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_not_cached() {
        let source = Arc::new(CountingSource::new(Err(LoadError::NotFound(String::new()))));
        let loader = ManifestLoader::new(source.clone(), ManifestMode::Production);

        assert!(loader.load().await.is_empty());
        assert!(!loader.is_loaded());

        source.set_body(MANIFEST);
        assert_eq!(loader.load().await.len(), 3);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_json_is_empty() {
        let loader = ManifestLoader::new(
            Arc::new(StaticManifestSource::new("{ nope")),
            ManifestMode::Production,
        );
        assert!(loader.load().await.is_empty());
        assert_eq!(loader.resolve_bundle_paths("feed", None).await, None);
    }

    #[tokio::test]
    async fn test_development_skips_fetch() {
        let source = Arc::new(CountingSource::new(Ok(MANIFEST.to_string())));
        let loader = ManifestLoader::new(source.clone(), ManifestMode::Development);

        assert!(loader.load().await.is_empty());
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_cache_refetches() {
        let source = Arc::new(CountingSource::new(Ok(MANIFEST.to_string())));
        let loader = ManifestLoader::new(source.clone(), ManifestMode::Production);

        loader.load().await;
        loader.clear_cache();
        loader.load().await;

        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_explicit_manifest_skips_load() {
        let source = Arc::new(CountingSource::new(Ok(MANIFEST.to_string())));
        let loader = ManifestLoader::new(source.clone(), ManifestMode::Production);
        let manifest = Manifest::from_json_str(r#"{ "only": "/only.js" }"#).unwrap();

        let paths = loader.resolve_bundle_paths("only", Some(&manifest)).await;
        assert_eq!(paths.and_then(|p| p.script).as_deref(), Some("/only.js"));
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_file_source() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("section-manifest.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let loader = ManifestLoader::from_config(&ManifestConfig {
            mode: ManifestMode::Production,
            path: path.display().to_string(),
        });
        assert_eq!(loader.load().await.len(), 3);

        let missing = ManifestLoader::new(
            Arc::new(FileManifestSource::new(dir.path().join("nope.json"))),
            ManifestMode::Production,
        );
        assert!(missing.load().await.is_empty());
    }
}
