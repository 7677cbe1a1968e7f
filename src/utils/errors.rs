use std::fmt::Display;

use thiserror::Error;

use crate::storage::scheme::SUPPORTED_PREFIXES;

pub type EmptyResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;
pub type StorageResult<T> = Result<T, StorageError>;

/// Every way a download can fail. Nothing here is retried internally.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(
        "Cannot recognize storage type for {uri}\n'{supported}' are the current available storage types",
        supported = SUPPORTED_PREFIXES.join("', '")
    )]
    UnrecognizedScheme { uri: String },

    #[error("Local path {uri} does not exist")]
    LocalPathNotFound { uri: String },

    #[error("Failed to fetch model. The path or model {uri} does not exist")]
    ArtifactNotFound { uri: String },

    #[error("No filename contained in URI: {uri}")]
    MissingFilename { uri: String },

    #[error("URI: {uri} returned a {status} response code")]
    FetchFailed { uri: String, status: u16 },

    #[error("URI: {uri} did not respond with 'Content-Type': '{expected}' (got '{actual}')")]
    ContentTypeMismatch {
        uri: String,
        expected: &'static str,
        actual: String,
    },

    #[error("Azure service principal token exchange failed: {0}")]
    CredentialExchange(String),

    #[error("Invalid URI {uri}: {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("Invalid headers configured for host {host}: {reason}")]
    InvalidHeaders { host: String, reason: String },

    #[error("{backend} error: {message}")]
    Backend {
        backend: &'static str,
        message: String,
    },

    #[error("Failed to extract archive {path}: {message}")]
    Archive { path: String, message: String },

    #[error("Download of {uri} was cancelled")]
    Cancelled { uri: String },

    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub trait ResultTrait<T, E> {
    /// Wraps a foreign error as a [`StorageError::Backend`] tagged with the backend name.
    fn backend_err(self, backend: &'static str, desc: &str) -> StorageResult<T>;
}

impl<T, E> ResultTrait<T, E> for Result<T, E>
where
    E: Display,
{
    fn backend_err(self, backend: &'static str, desc: &str) -> StorageResult<T> {
        match self {
            Ok(t) => Ok(t),
            Err(e) => Err(StorageError::Backend {
                backend,
                message: format!("{desc}: {e}"),
            }),
        }
    }
}
