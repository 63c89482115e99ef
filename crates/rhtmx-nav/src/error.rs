//! Error types for navigation services

use thiserror::Error;

/// Failure reaching one of the external capabilities
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to load {href}: {reason}")]
    Asset { href: String, reason: String },

    #[error("translation unit {path} must be a JSON object")]
    NotAnObject { path: String },
}

impl LoadError {
    pub fn io(path: impl Into<String>, source: std::io::Error) -> Self {
        LoadError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn parse(path: impl Into<String>, source: serde_json::Error) -> Self {
        LoadError::Parse {
            path: path.into(),
            source,
        }
    }

    pub fn asset(href: impl Into<String>, reason: impl Into<String>) -> Self {
        LoadError::Asset {
            href: href.into(),
            reason: reason.into(),
        }
    }
}

/// Failure inside a guard
///
/// Any guard error aborts the chain and blocks the navigation.
#[derive(Debug, Error)]
pub enum GuardError {
    #[error("no route resolved for navigation target {0}")]
    MissingTarget(String),

    #[error("guard {guard} failed: {reason}")]
    Failed { guard: &'static str, reason: String },
}

pub type LoadResult<T> = std::result::Result<T, LoadError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        let err = LoadError::asset("/assets/feed.js", "connection reset");
        assert_eq!(err.to_string(), "failed to load /assets/feed.js: connection reset");

        let err = GuardError::Failed {
            guard: "role",
            reason: "profile unreadable".to_string(),
        };
        assert_eq!(err.to_string(), "guard role failed: profile unreadable");
    }
}
