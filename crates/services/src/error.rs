//! Shared error types for the services crate.

use thiserror::Error;

use storage::sqlite::SqliteInitError;

/// Errors emitted by the learner API client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ApiError {
    #[error("learner API request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error("learner API returned an unreadable payload: {0}")]
    Payload(String),
    #[error("invalid learner API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while loading `EngineConfig`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    #[error("invalid API base URL `{raw}`: {source}")]
    InvalidBaseUrl {
        raw: String,
        #[source]
        source: url::ParseError,
    },
    #[error("{var} must be a non-negative integer, got `{raw}`")]
    InvalidNumber { var: &'static str, raw: String },
}

/// Errors emitted while bootstrapping a session context.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SessionInitError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
}

/// Errors emitted while changing the learner's active modules.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ModuleSelectionError {
    #[error("no learner is signed in")]
    MissingIdentity,
    #[error(transparent)]
    Api(#[from] ApiError),
}
