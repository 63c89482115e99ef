//! Platform capabilities: current URL, history push, preferred language

use parking_lot::Mutex;

/// Access to the hosting platform's address bar and language settings
pub trait Environment: Send + Sync {
    /// Current URL as path plus optional query, e.g. `/vi/feed?tab=new`
    fn current_url(&self) -> String;

    /// Replace the current URL without reloading
    fn push_url(&self, url: &str);

    /// Preferred language tag such as `en-US`
    fn preferred_language(&self) -> Option<String>;
}

/// In-process environment
///
/// Used by the CLI and tests; keeps every pushed URL for inspection.
#[derive(Debug)]
pub struct MemoryEnvironment {
    url: Mutex<String>,
    pushed: Mutex<Vec<String>>,
    language: Mutex<Option<String>>,
}

impl MemoryEnvironment {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Mutex::new(url.into()),
            pushed: Mutex::new(Vec::new()),
            language: Mutex::new(None),
        }
    }

    pub fn with_language(self, language: impl Into<String>) -> Self {
        *self.language.lock() = Some(language.into());
        self
    }

    pub fn set_language(&self, language: Option<String>) {
        *self.language.lock() = language;
    }

    /// URLs pushed so far, oldest first
    pub fn pushed_urls(&self) -> Vec<String> {
        self.pushed.lock().clone()
    }
}

impl Default for MemoryEnvironment {
    fn default() -> Self {
        Self::new("/")
    }
}

impl Environment for MemoryEnvironment {
    fn current_url(&self) -> String {
        self.url.lock().clone()
    }

    fn push_url(&self, url: &str) {
        *self.url.lock() = url.to_string();
        self.pushed.lock().push(url.to_string());
    }

    fn preferred_language(&self) -> Option<String> {
        self.language.lock().clone()
    }
}

/// Decoded value of query parameter `name`
pub fn query_param(query: &str, name: &str) -> Option<String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
        .find(|(key, _)| decode(key) == name)
        .map(|(_, value)| decode(value))
}

/// Set query parameter `name` on `url`, replacing any existing value
///
/// ```
/// use rhtmx_nav::environment::with_query_param;
///
/// assert_eq!(with_query_param("/feed", "locale", "vi"), "/feed?locale=vi");
/// assert_eq!(
///     with_query_param("/feed?locale=en&tab=new#top", "locale", "vi"),
///     "/feed?locale=vi&tab=new#top"
/// );
/// ```
pub fn with_query_param(url: &str, name: &str, value: &str) -> String {
    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };

    let encoded = format!("{}={}", urlencoding::encode(name), urlencoding::encode(value));
    let mut replaced = false;
    let mut pairs: Vec<String> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let key = pair.split_once('=').map_or(pair, |(key, _)| key);
            if decode(key) == name && !replaced {
                replaced = true;
                encoded.clone()
            } else {
                pair.to_string()
            }
        })
        .collect();
    if !replaced {
        pairs.push(encoded);
    }

    let mut out = format!("{}?{}", path, pairs.join("&"));
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

fn decode(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(|decoded| decoded.into_owned())
        .unwrap_or(spaced)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_param() {
        assert_eq!(query_param("locale=vi&tab=new", "locale").as_deref(), Some("vi"));
        assert_eq!(query_param("tab=new", "locale"), None);
        assert_eq!(query_param("q=hello%20world", "q").as_deref(), Some("hello world"));
        assert_eq!(query_param("flag", "flag").as_deref(), Some(""));
    }

    #[test]
    fn test_with_query_param_appends() {
        assert_eq!(with_query_param("/a?x=1", "locale", "en"), "/a?x=1&locale=en");
    }

    #[test]
    fn test_memory_environment_records_pushes() {
        let env = MemoryEnvironment::new("/").with_language("vi-VN");
        env.push_url("/feed?locale=vi");

        assert_eq!(env.current_url(), "/feed?locale=vi");
        assert_eq!(env.pushed_urls(), vec!["/feed?locale=vi"]);
        assert_eq!(env.preferred_language().as_deref(), Some("vi-VN"));
    }
}
