//! Section bundle preloading
//!
//! Preloading a section injects `<link rel="modulepreload">` for its script
//! and `<link rel="preload" as="style">` for its stylesheet into the
//! document's resource table, then waits for both to settle. A section is
//! loaded at most once; a second request while the first is running returns
//! `false` straight away instead of sharing the first request's future.

use crate::cache::{preload_cache_key, CachedValue, NavCache};
use crate::config::PreloadConfig;
use crate::error::{LoadError, LoadResult};
use crate::manifest::ManifestLoader;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use rhtmx_cache::{Clock, SystemClock};
use serde::Serialize;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PreloadState {
    NotRequested,
    InProgress,
    Loaded,
    /// Last attempt failed; the next request tries again
    Failed,
}

/// Informational record cached after a successful preload
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreloadRecord {
    pub loaded: bool,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkRel {
    ModulePreload,
    Preload,
}

impl LinkRel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LinkRel::ModulePreload => "modulepreload",
            LinkRel::Preload => "preload",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AssetKind {
    Script,
    Style,
}

impl AssetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssetKind::Script => "script",
            AssetKind::Style => "style",
        }
    }
}

/// A preload reference as it would appear in the document head
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadLink {
    pub href: String,
    pub rel: LinkRel,
    pub as_type: AssetKind,
}

impl PreloadLink {
    pub fn script(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: LinkRel::ModulePreload,
            as_type: AssetKind::Script,
        }
    }

    pub fn style(href: impl Into<String>) -> Self {
        Self {
            href: href.into(),
            rel: LinkRel::Preload,
            as_type: AssetKind::Style,
        }
    }

    /// HTML for the link element
    pub fn to_html(&self) -> String {
        format!(
            r#"<link rel="{}" href="{}" as="{}">"#,
            self.rel.as_str(),
            self.href,
            self.as_type.as_str()
        )
    }
}

/// The document's set of resource references
#[async_trait]
pub trait ResourceTable: Send + Sync {
    /// Check for a reference with exactly this href
    fn has_reference(&self, href: &str) -> bool;

    /// Add `link` and wait until it has loaded or failed
    async fn inject_preload(&self, link: PreloadLink) -> LoadResult<()>;
}

/// Fetches the asset behind a preload link
#[async_trait]
pub trait AssetLoader: Send + Sync {
    async fn load(&self, link: &PreloadLink) -> LoadResult<()>;
}

/// Assets served from a build output directory
///
/// An href `/assets/feed.js` resolves to `<root>/assets/feed.js`; the load
/// succeeds when that file exists.
#[derive(Debug, Clone)]
pub struct StaticAssetDir {
    root: PathBuf,
}

impl StaticAssetDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn from_config(config: &PreloadConfig) -> Self {
        Self::new(&config.asset_dir)
    }

    fn resolve(&self, href: &str) -> PathBuf {
        let relative = href.split(['?', '#']).next().unwrap_or(href);
        self.root.join(relative.trim_start_matches('/'))
    }
}

#[async_trait]
impl AssetLoader for StaticAssetDir {
    async fn load(&self, link: &PreloadLink) -> LoadResult<()> {
        let path = self.resolve(&link.href);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(LoadError::asset(&link.href, "not a file")),
            Err(e) => Err(LoadError::asset(&link.href, e.to_string())),
        }
    }
}

/// In-memory resource table
///
/// A link is recorded before its load starts, so concurrent callers see it
/// immediately. A link whose load fails is removed again.
pub struct DocumentHead {
    links: Mutex<Vec<PreloadLink>>,
    loader: Arc<dyn AssetLoader>,
}

impl DocumentHead {
    pub fn new(loader: Arc<dyn AssetLoader>) -> Self {
        Self {
            links: Mutex::new(Vec::new()),
            loader,
        }
    }

    pub fn links(&self) -> Vec<PreloadLink> {
        self.links.lock().clone()
    }

    pub fn count_of(&self, kind: AssetKind) -> usize {
        self.links
            .lock()
            .iter()
            .filter(|link| link.as_type == kind)
            .count()
    }

    pub fn render(&self) -> String {
        self.links
            .lock()
            .iter()
            .map(PreloadLink::to_html)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[async_trait]
impl ResourceTable for DocumentHead {
    fn has_reference(&self, href: &str) -> bool {
        self.links.lock().iter().any(|link| link.href == href)
    }

    async fn inject_preload(&self, link: PreloadLink) -> LoadResult<()> {
        self.links.lock().push(link.clone());
        debug!(href = %link.href, rel = link.rel.as_str(), "Preload link injected");

        let result = self.loader.load(&link).await;
        if result.is_err() {
            self.links.lock().retain(|existing| existing.href != link.href);
        }
        result
    }
}

impl std::fmt::Debug for DocumentHead {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentHead")
            .field("links", &self.links.lock().len())
            .finish()
    }
}

/// Result of preloading several sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PreloadSummary {
    pub successful: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreloadStatistics {
    pub preloaded_count: usize,
    pub preloaded_sections: Vec<String>,
    pub in_progress_count: usize,
    pub in_progress_sections: Vec<String>,
    pub failed_sections: Vec<String>,
}

/// Coordinates section preloads so each section loads once
pub struct SectionPreloader {
    states: Mutex<HashMap<String, PreloadState>>,
    manifest: Arc<ManifestLoader>,
    resources: Arc<dyn ResourceTable>,
    cache: Arc<NavCache>,
    record_ttl_ms: i64,
    clock: Arc<dyn Clock>,
}

impl SectionPreloader {
    pub fn new(
        manifest: Arc<ManifestLoader>,
        resources: Arc<dyn ResourceTable>,
        cache: Arc<NavCache>,
        config: &PreloadConfig,
    ) -> Self {
        Self {
            states: Mutex::new(HashMap::new()),
            manifest,
            resources,
            cache,
            record_ttl_ms: config.record_ttl_ms,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Preload the script and style bundles of `section`
    ///
    /// Returns `true` once both are loaded (or the section already was),
    /// `false` when another call is loading it, when it is not in the
    /// manifest, or when a bundle fails to load.
    pub async fn preload_section(&self, section: &str) -> bool {
        {
            let mut states = self.states.lock();
            match states.get(section) {
                Some(PreloadState::Loaded) => {
                    debug!(section, "Section already preloaded");
                    return true;
                }
                Some(PreloadState::InProgress) => {
                    debug!(section, "Section preload already in progress");
                    return false;
                }
                _ => {}
            }
            states.insert(section.to_string(), PreloadState::InProgress);
        }
        let marker = InFlightMarker::new(&self.states, section);

        let Some(paths) = self.manifest.resolve_bundle_paths(section, None).await else {
            warn!(section, "No bundles in manifest, skipping preload");
            marker.release();
            return false;
        };

        if paths.script.is_none() && paths.style.is_none() {
            debug!(section, "Bundle has no script or style, nothing to inject");
        }

        let mut result = Ok(());
        if let Some(script) = paths.script {
            result = self.inject_once(PreloadLink::script(script)).await;
        }
        if result.is_ok() {
            if let Some(style) = paths.style {
                result = self.inject_once(PreloadLink::style(style)).await;
            }
        }

        match result {
            Ok(()) => {
                marker.settle(PreloadState::Loaded);
                self.cache.set(
                    &preload_cache_key(section),
                    CachedValue::Preload(PreloadRecord {
                        loaded: true,
                        timestamp: self.clock.now(),
                    }),
                    self.record_ttl_ms,
                );
                info!(section, "Section preloaded");
                true
            }
            Err(e) => {
                marker.settle(PreloadState::Failed);
                error!(section, error = %e, "Section preload failed");
                false
            }
        }
    }

    /// Preload every section concurrently; one failure doesn't affect others
    pub async fn preload_multiple_sections<S: AsRef<str>>(&self, sections: &[S]) -> PreloadSummary {
        let results = join_all(sections.iter().map(|section| async move {
            let section = section.as_ref();
            (section.to_string(), self.preload_section(section).await)
        }))
        .await;

        let mut summary = PreloadSummary::default();
        for (section, ok) in results {
            if ok {
                summary.successful.push(section);
            } else {
                summary.failed.push(section);
            }
        }
        info!(
            successful = summary.successful.len(),
            failed = summary.failed.len(),
            "Batch section preload completed"
        );
        summary
    }

    pub fn is_section_preloaded(&self, section: &str) -> bool {
        self.preload_state(section) == PreloadState::Loaded
    }

    pub fn preload_state(&self, section: &str) -> PreloadState {
        self.states
            .lock()
            .get(section)
            .copied()
            .unwrap_or(PreloadState::NotRequested)
    }

    /// Forget every section's state and preload record
    ///
    /// Injected links stay in the resource table, so a new preload of the
    /// same bundles is satisfied without another load.
    pub fn clear_preload_state(&self) {
        let cleared: Vec<String> = self.states.lock().drain().map(|(section, _)| section).collect();
        for section in &cleared {
            self.cache.delete(&preload_cache_key(section));
        }
        debug!(cleared = cleared.len(), "Preload state cleared");
    }

    pub fn preload_statistics(&self) -> PreloadStatistics {
        let states = self.states.lock();
        let collect = |wanted: PreloadState| {
            let mut sections: Vec<String> = states
                .iter()
                .filter(|(_, state)| **state == wanted)
                .map(|(section, _)| section.clone())
                .collect();
            sections.sort();
            sections
        };

        let preloaded_sections = collect(PreloadState::Loaded);
        let in_progress_sections = collect(PreloadState::InProgress);
        PreloadStatistics {
            preloaded_count: preloaded_sections.len(),
            preloaded_sections,
            in_progress_count: in_progress_sections.len(),
            in_progress_sections,
            failed_sections: collect(PreloadState::Failed),
        }
    }

    async fn inject_once(&self, link: PreloadLink) -> LoadResult<()> {
        if self.resources.has_reference(&link.href) {
            debug!(href = %link.href, "Bundle already referenced");
            return Ok(());
        }
        self.resources.inject_preload(link).await
    }
}

impl std::fmt::Debug for SectionPreloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SectionPreloader")
            .field("sections", &self.states.lock().len())
            .finish()
    }
}

/// Removes the in-progress marker if the preload future is dropped
struct InFlightMarker<'a> {
    states: &'a Mutex<HashMap<String, PreloadState>>,
    section: &'a str,
    done: bool,
}

impl<'a> InFlightMarker<'a> {
    fn new(states: &'a Mutex<HashMap<String, PreloadState>>, section: &'a str) -> Self {
        Self {
            states,
            section,
            done: false,
        }
    }

    fn settle(mut self, state: PreloadState) {
        self.states.lock().insert(self.section.to_string(), state);
        self.done = true;
    }

    fn release(self) {}
}

impl Drop for InFlightMarker<'_> {
    fn drop(&mut self) {
        if !self.done {
            self.states.lock().remove(self.section);
        }
    }
}
