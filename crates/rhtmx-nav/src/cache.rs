//! Values shared through the navigation cache

use crate::preload::PreloadRecord;
use crate::translation::TranslationMap;
use rhtmx_cache::TtlCache;
use std::sync::Arc;

/// Everything the navigation services keep in the shared TTL cache
#[derive(Debug, Clone, PartialEq)]
pub enum CachedValue {
    /// The user's manually selected locale
    Locale(String),
    /// Informational record of a completed section preload
    Preload(PreloadRecord),
    /// Merged translations for one `(section, locale)`
    Translations(Arc<TranslationMap>),
}

impl CachedValue {
    pub fn as_locale(&self) -> Option<&str> {
        match self {
            CachedValue::Locale(code) => Some(code),
            _ => None,
        }
    }

    pub fn as_translations(&self) -> Option<&Arc<TranslationMap>> {
        match self {
            CachedValue::Translations(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_preload(&self) -> Option<&PreloadRecord> {
        match self {
            CachedValue::Preload(record) => Some(record),
            _ => None,
        }
    }
}

/// Cache shared by the locale resolver, preloader and translation loader
pub type NavCache = TtlCache<CachedValue>;

/// Key under which a section's preload record is stored
pub fn preload_cache_key(section: &str) -> String {
    format!("section_preload_{}", section)
}

/// Key under which merged translations are stored
pub fn translation_cache_key(section: &str, locale: &str) -> String {
    format!("translation_{}_{}", section, locale)
}
