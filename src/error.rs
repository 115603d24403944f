use std::sync::Arc;

/// Result type used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while evaluating or mutating feature toggles.
#[derive(thiserror::Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// The status (or verb) name is not part of the registry.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// A configuration value could not be parsed.
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The settings storage could not be reached or failed internally.
    #[error("settings storage failure: {0}")]
    // Boxed errors are not clonable, so we're wrapping it in an Arc.
    Storage(#[source] Arc<dyn std::error::Error + Send + Sync>),
}

impl Error {
    /// Wrap an arbitrary storage error.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Error::Storage(Arc::new(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(value: std::io::Error) -> Self {
        Error::storage(value)
    }
}

impl From<serde_json::Error> for Error {
    fn from(value: serde_json::Error) -> Self {
        Error::storage(value)
    }
}
