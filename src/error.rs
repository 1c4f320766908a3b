use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of a single remote fetch (launch, navigate, wait, extract).
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("launch browser: {reason}")]
    Launch { reason: String },

    #[error("navigate {url}: {reason}")]
    Navigation { url: String, reason: String },

    #[error("extract field {field:?}: {reason}")]
    Extraction { field: String, reason: String },
}

impl FetchError {
    pub fn launch(reason: impl std::fmt::Display) -> Self {
        Self::Launch {
            reason: reason.to_string(),
        }
    }

    pub fn navigation(url: impl std::fmt::Display, reason: impl std::fmt::Display) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn timed_out(url: impl std::fmt::Display, what: &str, after: Duration) -> Self {
        Self::Navigation {
            url: url.to_string(),
            reason: format!("{what} timed out after {}ms", after.as_millis()),
        }
    }

    pub fn extraction(field: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Extraction {
            field: field.into(),
            reason: reason.to_string(),
        }
    }

    /// Launch and navigation failures are transient. An extraction failure
    /// means the remote markup no longer matches the rules, and retrying
    /// will not change that.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Launch { .. } | Self::Navigation { .. } => true,
            Self::Extraction { .. } => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("invalid book id: {0:?}")]
    InvalidId(String),

    #[error("book not found: {0}")]
    UnknownBook(String),

    #[error("chapter index {index} out of range for book {book_id} ({len} chapters)")]
    ChapterOutOfRange {
        book_id: String,
        index: usize,
        len: usize,
    },

    #[error("{action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{action} {}: {source}", path.display())]
    Json {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl PersistenceError {
    pub(crate) fn io(action: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            action,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: serde_json::Error,
    ) -> Self {
        Self::Json {
            action,
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_extraction_errors_are_final() {
        assert!(FetchError::launch("no chrome").is_retryable());
        assert!(FetchError::navigation("https://a.test/", "dns").is_retryable());
        assert!(
            FetchError::timed_out("https://a.test/", "navigation", Duration::from_secs(60))
                .is_retryable()
        );
        assert!(!FetchError::extraction("chapters", "selector matched nothing").is_retryable());
    }

    #[test]
    fn timeout_message_names_the_bound() {
        let err = FetchError::timed_out("https://a.test/c1", "readiness", Duration::from_secs(30));
        assert_eq!(
            err.to_string(),
            "navigate https://a.test/c1: readiness timed out after 30000ms"
        );
    }
}
