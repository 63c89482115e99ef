//! Slug patterns
//!
//! Slugs are matched segment by segment. Supported tokens:
//!
//! | Token              | Matches                         |
//! |--------------------|---------------------------------|
//! | `about`            | the literal segment             |
//! | `:id`              | exactly one segment             |
//! | `:id?`             | zero or one segment             |
//! | `*rest`            | one or more trailing segments   |
//! | `*rest?`           | zero or more trailing segments  |
//! | `:rest(.*)*`       | zero or more trailing segments  |
//! | `:rest(.*)`, `:rest+` | one or more trailing segments |
//!
//! A parenthesized constraint on a plain parameter (`:id(\\d+)`) is accepted
//! but not enforced.

use std::collections::BTreeMap;

/// Parameters captured by a match, keyed by name
pub type PathParams = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternSegment {
    Static(String),
    Param(String),
    Optional(String),
    CatchAll { name: String, optional: bool },
}

impl PatternSegment {
    pub fn is_dynamic(&self) -> bool {
        !matches!(self, PatternSegment::Static(_))
    }
}

/// Classify one slug segment
///
/// ```
/// use rhtmx_router::pattern::{classify_segment, PatternSegment};
///
/// assert_eq!(classify_segment("feed"), PatternSegment::Static("feed".into()));
/// assert_eq!(classify_segment(":id?"), PatternSegment::Optional("id".into()));
/// assert_eq!(
///     classify_segment(":pathMatch(.*)*"),
///     PatternSegment::CatchAll { name: "pathMatch".into(), optional: true }
/// );
/// ```
pub fn classify_segment(raw: &str) -> PatternSegment {
    if let Some(name) = raw.strip_prefix('*') {
        return match name.strip_suffix('?') {
            Some(name) => PatternSegment::CatchAll {
                name: name.to_string(),
                optional: true,
            },
            None => PatternSegment::CatchAll {
                name: name.to_string(),
                optional: false,
            },
        };
    }

    let Some(param) = raw.strip_prefix(':') else {
        return PatternSegment::Static(raw.to_string());
    };

    if let Some(name) = param
        .strip_suffix("(.*)*")
        .or_else(|| param.strip_suffix('*'))
    {
        return PatternSegment::CatchAll {
            name: name.to_string(),
            optional: true,
        };
    }

    if let Some(name) = param
        .strip_suffix("(.*)+")
        .or_else(|| param.strip_suffix("(.*)"))
        .or_else(|| param.strip_suffix('+'))
    {
        return PatternSegment::CatchAll {
            name: name.to_string(),
            optional: false,
        };
    }

    let (param, optional) = match param.strip_suffix('?') {
        Some(param) => (param, true),
        None => (param, false),
    };
    let name = param.split('(').next().unwrap_or(param).to_string();

    if optional {
        PatternSegment::Optional(name)
    } else {
        PatternSegment::Param(name)
    }
}

/// A parsed slug
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePattern {
    segments: Vec<PatternSegment>,
}

impl RoutePattern {
    pub fn parse(slug: &str) -> Self {
        Self {
            segments: crate::path::segments(slug)
                .into_iter()
                .map(classify_segment)
                .collect(),
        }
    }

    pub fn segments(&self) -> &[PatternSegment] {
        &self.segments
    }

    pub fn is_dynamic(&self) -> bool {
        self.segments.iter().any(PatternSegment::is_dynamic)
    }

    /// Check if the pattern is nothing but a catch-all (`/:pathMatch(.*)*`)
    pub fn is_catch_all_only(&self) -> bool {
        matches!(self.segments.as_slice(), [PatternSegment::CatchAll { .. }])
    }

    /// Match a normalized path, returning the captured parameters
    ///
    /// ```
    /// use rhtmx_router::pattern::RoutePattern;
    ///
    /// let pattern = RoutePattern::parse("/profile/:username");
    /// let params = pattern.match_path("/profile/alice").unwrap();
    /// assert_eq!(params["username"], "alice");
    /// assert!(pattern.match_path("/profile").is_none());
    /// ```
    pub fn match_path(&self, path: &str) -> Option<PathParams> {
        let parts = crate::path::segments(path);
        match_segments(&self.segments, &parts, PathParams::new())
    }
}

fn match_segments(
    pattern: &[PatternSegment],
    path: &[&str],
    mut params: PathParams,
) -> Option<PathParams> {
    let Some((head, rest)) = pattern.split_first() else {
        return path.is_empty().then_some(params);
    };

    match head {
        PatternSegment::Static(expected) => {
            let (first, remaining) = path.split_first()?;
            if first != expected {
                return None;
            }
            match_segments(rest, remaining, params)
        }
        PatternSegment::Param(name) => {
            let (first, remaining) = path.split_first()?;
            params.insert(name.clone(), (*first).to_string());
            match_segments(rest, remaining, params)
        }
        PatternSegment::Optional(name) => {
            // Prefer consuming the segment, fall back to skipping it
            if let Some((first, remaining)) = path.split_first() {
                let mut consumed = params.clone();
                consumed.insert(name.clone(), (*first).to_string());
                if let Some(found) = match_segments(rest, remaining, consumed) {
                    return Some(found);
                }
            }
            match_segments(rest, path, params)
        }
        PatternSegment::CatchAll { name, optional } => {
            if path.is_empty() && !optional {
                return None;
            }
            params.insert(name.clone(), path.join("/"));
            match_segments(rest, &[], params)
        }
    }
}
