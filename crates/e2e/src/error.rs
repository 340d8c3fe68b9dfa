//! Error types for the verification runner

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum E2eError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Target {url} unreachable after {attempts} attempts")]
    TargetUnreachable { url: String, attempts: usize },

    #[error("Timeout after {} ms waiting for: {what}", .after.as_millis())]
    Timeout { what: String, after: Duration },

    #[error("Navigation to {url} failed with status {status}")]
    Navigation { url: String, status: u16 },

    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("No document loaded; navigate first")]
    NoDocument,

    #[error("Playwright not found. Install with: npm install playwright && npx playwright install")]
    PlaywrightNotFound,

    #[error("Playwright error: {0}")]
    Playwright(String),

    #[error("Suite parse error: {0}")]
    SpecParse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl E2eError {
    pub fn timeout(what: impl Into<String>, after: Duration) -> Self {
        E2eError::Timeout {
            what: what.into(),
            after,
        }
    }

    /// Errors that make the whole run pointless; no check may start after one.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            E2eError::Configuration(_)
                | E2eError::TargetUnreachable { .. }
                | E2eError::Url(_)
                | E2eError::PlaywrightNotFound
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            E2eError::Timeout { .. } => true,
            E2eError::Http(e) => e.is_timeout(),
            _ => false,
        }
    }
}

pub type E2eResult<T> = Result<T, E2eError>;
