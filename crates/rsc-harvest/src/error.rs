//! Error and warning types for the harvesting pipeline.

use std::path::PathBuf;

use serde::Serialize;

/// Errors that can abort (or, for figures, degrade) a harvest run.
#[derive(thiserror::Error, Debug)]
pub enum HarvestError {
    /// Malformed or unsupported article identifier. Raised before any
    /// browser session is opened.
    #[error("Invalid identifier: {0}")]
    Validation(String),

    #[error("Credential error: {0}")]
    Credential(String),

    /// A page control did not appear within the implicit wait.
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Unreadable snapshot: {0}")]
    Snapshot(String),

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Browser session error: {0}")]
    Session(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HarvestError {
    /// Wrap an I/O error with the path it concerns.
    pub fn fs(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.into(),
            source,
        }
    }

    /// Whether the failure may clear up if the page is given more time.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ElementNotFound(_) | Self::Snapshot(_))
    }

    /// Process exit code used by the command-line front end.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) => 2,
            Self::Credential(_) => 3,
            Self::Filesystem { .. } => 4,
            _ => 1,
        }
    }
}

/// Convenience result type.
pub type HarvestResult<T> = Result<T, HarvestError>;

/// Failures reported by a [`BrowserDriver`](crate::session::BrowserDriver).
#[derive(thiserror::Error, Debug)]
pub enum DriverError {
    #[error("stale element handle #{0}")]
    StaleHandle(u64),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("{0}")]
    Browser(String),
}

impl From<DriverError> for HarvestError {
    fn from(err: DriverError) -> Self {
        HarvestError::Session(err.to_string())
    }
}

/// Non-fatal outcomes recorded on the output bundle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HarvestWarning {
    /// Figure extraction failed twice; `gathered` records were kept.
    PartialFigures { gathered: usize, reason: String },
    /// The supplementary step could not run at all.
    SupplementaryUnavailable { reason: String },
    SupplementaryDownloadFailed { label: String, reason: String },
}

impl std::fmt::Display for HarvestWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PartialFigures { gathered, reason } => {
                write!(f, "figure extraction incomplete ({gathered} kept): {reason}")
            }
            Self::SupplementaryUnavailable { reason } => {
                write!(f, "supplementary files skipped: {reason}")
            }
            Self::SupplementaryDownloadFailed { label, reason } => {
                write!(f, "download of '{label}' failed: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes_distinguish_fatal_kinds() {
        assert_eq!(HarvestError::Validation("x".into()).exit_code(), 2);
        assert_eq!(HarvestError::Credential("x".into()).exit_code(), 3);
        let fs = HarvestError::fs("/tmp/x", std::io::Error::other("boom"));
        assert_eq!(fs.exit_code(), 4);
        assert_eq!(HarvestError::Session("x".into()).exit_code(), 1);
    }

    #[test]
    fn test_transient_kinds() {
        assert!(HarvestError::ElementNotFound(".imgHolder".into()).is_transient());
        assert!(HarvestError::Snapshot("empty".into()).is_transient());
        assert!(!HarvestError::Credential("denied".into()).is_transient());
        assert!(!HarvestError::Session("crashed".into()).is_transient());
    }

    #[test]
    fn test_driver_error_becomes_session_error() {
        let err: HarvestError = DriverError::StaleHandle(7).into();
        assert!(matches!(err, HarvestError::Session(msg) if msg.contains("#7")));
    }
}
