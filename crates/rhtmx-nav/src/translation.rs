//! Per-section translation loading
//!
//! Each section ships one translation unit per locale:
//!
//! ```text
//! i18n/
//!   section-feed/
//!     en.json
//!     vi.json
//!   section-profile/
//!     en.json
//! ```
//!
//! The base locale's unit must exist. Other locales are merged over it, so
//! a key missing from `vi.json` falls back to the English string.

use crate::cache::{translation_cache_key, CachedValue, NavCache};
use crate::config::TranslationConfig;
use crate::error::{LoadError, LoadResult};
use async_trait::async_trait;
use futures::future::join_all;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Flat key → string mapping; nested keys are joined with `.`
pub type TranslationMap = BTreeMap<String, String>;

/// Where translation units come from
#[async_trait]
pub trait TranslationSource: Send + Sync {
    /// Check if a unit exists for `(section, locale)`
    fn has_unit(&self, section: &str, locale: &str) -> bool;

    async fn load(&self, section: &str, locale: &str) -> LoadResult<TranslationMap>;
}

/// Flatten a translation unit into dotted keys
///
/// ```
/// use rhtmx_nav::translation::flatten_translations;
/// use serde_json::json;
///
/// let map = flatten_translations(&json!({ "title": "Feed", "empty": { "heading": "Nothing yet" } }));
/// assert_eq!(map["empty.heading"], "Nothing yet");
/// ```
pub fn flatten_translations(value: &Value) -> TranslationMap {
    let mut out = TranslationMap::new();
    flatten_into(&mut out, "", value);
    out
}

fn flatten_into(out: &mut TranslationMap, prefix: &str, value: &Value) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", prefix, key)
                };
                flatten_into(out, &path, child);
            }
        }
        Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        Value::Null => {}
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

/// Translation units on disk, indexed once at startup
#[derive(Debug, Clone, Default)]
pub struct DirectoryCatalog {
    root: PathBuf,
    units: HashMap<(String, String), PathBuf>,
}

impl DirectoryCatalog {
    /// Index every `section-<name>/<locale>.json` under `root`
    ///
    /// A missing or unreadable directory yields an empty catalog.
    pub fn scan(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref().to_path_buf();
        let mut units = HashMap::new();

        for entry in WalkDir::new(&root).min_depth(2).max_depth(2) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(root = %root.display(), error = %e, "Skipping unreadable translation path");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let section = path
                .parent()
                .and_then(|dir| dir.file_name())
                .and_then(|name| name.to_str())
                .and_then(|name| name.strip_prefix("section-"));
            let locale = path.file_stem().and_then(|stem| stem.to_str());

            if let (Some(section), Some(locale)) = (section, locale) {
                units.insert((section.to_string(), locale.to_string()), path.to_path_buf());
            }
        }

        info!(root = %root.display(), units = units.len(), "Translation catalog indexed");
        Self { root, units }
    }

    pub fn from_config(config: &TranslationConfig) -> Self {
        Self::scan(&config.dir)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Sections with at least one unit, sorted
    pub fn sections(&self) -> Vec<String> {
        let sections: BTreeSet<&String> = self.units.keys().map(|(section, _)| section).collect();
        sections.into_iter().cloned().collect()
    }
}

#[async_trait]
impl TranslationSource for DirectoryCatalog {
    fn has_unit(&self, section: &str, locale: &str) -> bool {
        self.units
            .contains_key(&(section.to_string(), locale.to_string()))
    }

    async fn load(&self, section: &str, locale: &str) -> LoadResult<TranslationMap> {
        let path = self
            .units
            .get(&(section.to_string(), locale.to_string()))
            .ok_or_else(|| LoadError::NotFound(format!("section-{}/{}.json", section, locale)))?;
        let display = path.display().to_string();

        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LoadError::io(&display, e))?;
        let value: Value = serde_json::from_str(&text).map_err(|e| LoadError::parse(&display, e))?;
        if !value.is_object() {
            return Err(LoadError::NotAnObject { path: display });
        }
        Ok(flatten_translations(&value))
    }
}

/// In-memory translation units
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    units: HashMap<(String, String), TranslationMap>,
    delay: Option<Duration>,
    loads: AtomicUsize,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_unit<K, V>(mut self, section: &str, locale: &str, entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map = entries
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect();
        self.units.insert((section.to_string(), locale.to_string()), map);
        self
    }

    /// Make every load take at least `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of `load` calls so far
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TranslationSource for MemoryCatalog {
    fn has_unit(&self, section: &str, locale: &str) -> bool {
        self.units
            .contains_key(&(section.to_string(), locale.to_string()))
    }

    async fn load(&self, section: &str, locale: &str) -> LoadResult<TranslationMap> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.units
            .get(&(section.to_string(), locale.to_string()))
            .cloned()
            .ok_or_else(|| LoadError::NotFound(format!("section-{}/{}.json", section, locale)))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranslationStatistics {
    pub loaded_count: usize,
    pub loaded_sections: Vec<String>,
    pub loading_in_progress: Vec<String>,
}

type Settlement = watch::Receiver<Option<Arc<TranslationMap>>>;

/// (section, locale)
type UnitKey = (String, String);

enum Flight {
    Lead(watch::Sender<Option<Arc<TranslationMap>>>),
    Follow(Settlement),
}

/// Loads, merges and caches section translations
pub struct TranslationLoader {
    source: Arc<dyn TranslationSource>,
    cache: Arc<NavCache>,
    base_locale: String,
    ttl_ms: i64,
    wait_timeout: Duration,
    in_flight: Mutex<HashMap<UnitKey, Settlement>>,
    loaded: Mutex<BTreeSet<UnitKey>>,
}

impl TranslationLoader {
    pub fn new(source: Arc<dyn TranslationSource>, cache: Arc<NavCache>, config: &TranslationConfig) -> Self {
        Self {
            source,
            cache,
            base_locale: config.base_locale.clone(),
            ttl_ms: config.ttl_ms,
            wait_timeout: Duration::from_millis(config.wait_timeout_ms),
            in_flight: Mutex::new(HashMap::new()),
            loaded: Mutex::new(BTreeSet::new()),
        }
    }

    /// Translations for `section` in `locale`, merged over the base locale
    ///
    /// Never fails. A missing base unit gives an empty map; a missing
    /// `locale` unit gives the base mapping alone. Concurrent calls for the
    /// same pair share one load.
    pub async fn load_translations_for_section(&self, section: &str, locale: &str) -> Arc<TranslationMap> {
        if !self.source.has_unit(section, &self.base_locale) {
            error!(section, locale, base = %self.base_locale, "Base translation unit missing");
            return Arc::new(TranslationMap::new());
        }

        let cache_key = translation_cache_key(section, locale);
        if let Some(map) = self
            .cache
            .get(&cache_key)
            .and_then(|value| value.as_translations().cloned())
        {
            debug!(section, locale, "Translation cache hit");
            return map;
        }

        let key = unit_key(section, locale);
        let flight = {
            let mut in_flight = self.in_flight.lock();
            match in_flight.get(&key) {
                Some(settlement) => Flight::Follow(settlement.clone()),
                None => {
                    let (tx, rx) = watch::channel(None);
                    in_flight.insert(key.clone(), rx);
                    Flight::Lead(tx)
                }
            }
        };

        let sender = match flight {
            Flight::Lead(sender) => sender,
            Flight::Follow(settlement) => {
                debug!(section, locale, "Translation load in progress, waiting");
                return self.wait_for_load(section, locale, settlement).await;
            }
        };
        let _marker = LoadingMarker {
            in_flight: &self.in_flight,
            key: &key,
        };

        let map = Arc::new(self.load_merged(section, locale).await);
        self.cache
            .set(&cache_key, CachedValue::Translations(map.clone()), self.ttl_ms);
        self.loaded.lock().insert(key.clone());
        sender.send_replace(Some(map.clone()));

        info!(section, locale, keys = map.len(), "Translations loaded");
        map
    }

    /// Load translations for every section concurrently
    pub async fn preload_translations_for_sections<S: AsRef<str>>(
        &self,
        sections: &[S],
        locale: &str,
    ) -> BTreeMap<String, Arc<TranslationMap>> {
        let results = join_all(sections.iter().map(|section| async move {
            let section = section.as_ref();
            (
                section.to_string(),
                self.load_translations_for_section(section, locale).await,
            )
        }))
        .await;

        let loaded = results.iter().filter(|(_, map)| !map.is_empty()).count();
        info!(
            sections = results.len(),
            non_empty = loaded,
            locale,
            "Batch translation preload completed"
        );
        results.into_iter().collect()
    }

    pub fn are_translations_loaded_for_section(&self, section: &str, locale: &str) -> bool {
        self.loaded.lock().contains(&unit_key(section, locale))
            && self.cache.has(&translation_cache_key(section, locale))
    }

    /// Drop every loaded map and its cache entry
    pub fn clear_translation_caches(&self) {
        let cleared = std::mem::take(&mut *self.loaded.lock());
        for (section, locale) in &cleared {
            self.cache.delete(&translation_cache_key(section, locale));
        }
        debug!(cleared = cleared.len(), "Translation caches cleared");
    }

    pub fn translation_statistics(&self) -> TranslationStatistics {
        let loaded_sections: Vec<String> = self.loaded.lock().iter().map(display_key).collect();
        let mut in_flight: Vec<UnitKey> = self.in_flight.lock().keys().cloned().collect();
        in_flight.sort();
        let loading_in_progress = in_flight.iter().map(display_key).collect();

        TranslationStatistics {
            loaded_count: loaded_sections.len(),
            loaded_sections,
            loading_in_progress,
        }
    }

    async fn load_merged(&self, section: &str, locale: &str) -> TranslationMap {
        let mut merged = self.load_unit(section, &self.base_locale).await;
        if locale == self.base_locale {
            return merged;
        }

        if self.source.has_unit(section, locale) {
            let overrides = self.load_unit(section, locale).await;
            debug!(
                section,
                locale,
                base_keys = merged.len(),
                locale_keys = overrides.len(),
                "Merging translations"
            );
            merged.extend(overrides);
        } else {
            warn!(section, locale, "Locale translation unit missing, using base only");
        }
        merged
    }

    async fn load_unit(&self, section: &str, locale: &str) -> TranslationMap {
        match self.source.load(section, locale).await {
            Ok(map) => map,
            Err(e) => {
                error!(section, locale, error = %e, "Failed to load translation unit");
                TranslationMap::new()
            }
        }
    }

    async fn wait_for_load(&self, section: &str, locale: &str, mut settlement: Settlement) -> Arc<TranslationMap> {
        let settled = tokio::time::timeout(self.wait_timeout, settlement.wait_for(Option::is_some)).await;
        match settled {
            Ok(Ok(map)) => match map.as_ref() {
                Some(map) => map.clone(),
                None => Arc::new(TranslationMap::new()),
            },
            Ok(Err(_)) => {
                warn!(section, locale, "Translation load abandoned");
                Arc::new(TranslationMap::new())
            }
            Err(_) => {
                warn!(section, locale, timeout_ms = self.wait_timeout.as_millis() as u64, "Translation load wait timed out");
                Arc::new(TranslationMap::new())
            }
        }
    }
}

impl std::fmt::Debug for TranslationLoader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationLoader")
            .field("base_locale", &self.base_locale)
            .field("loaded", &self.loaded.lock().len())
            .finish()
    }
}

fn unit_key(section: &str, locale: &str) -> UnitKey {
    (section.to_string(), locale.to_string())
}

fn display_key((section, locale): &UnitKey) -> String {
    format!("{}:{}", section, locale)
}

/// Removes the in-flight entry when the leading load ends or is dropped
struct LoadingMarker<'a> {
    in_flight: &'a Mutex<HashMap<UnitKey, Settlement>>,
    key: &'a UnitKey,
}

impl Drop for LoadingMarker<'_> {
    fn drop(&mut self) {
        self.in_flight.lock().remove(self.key);
    }
}
