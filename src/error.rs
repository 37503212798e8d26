use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SmokeError {
    #[error("Browser launch failed: {0}")]
    Launch(String),
    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },
    #[error("Element not found: {selector} ({message})")]
    ElementNotFound { selector: String, message: String },
    #[error("Interaction with {selector} failed: {message}")]
    Interaction { selector: String, message: String },
    #[error(
        "Timed out after {}ms waiting for {expected} (last seen: {})",
        .timeout.as_millis(),
        .actual.as_deref().unwrap_or("<none>")
    )]
    NavigationTimeout {
        expected: String,
        actual: Option<String>,
        timeout: Duration,
    },
    #[error("Screenshot failed: {0}")]
    Screenshot(String),
    #[error("Invalid test identity: {0}")]
    InvalidIdentity(String),
    #[error("Config error: {0}")]
    Config(String),
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, SmokeError>;

impl SmokeError {
    /// True for the two failure classes a broken target application produces.
    pub fn is_target_failure(&self) -> bool {
        matches!(
            self,
            SmokeError::NavigationTimeout { .. } | SmokeError::ElementNotFound { .. }
        )
    }
}
