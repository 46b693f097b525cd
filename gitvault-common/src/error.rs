// ================================================================
// File: gitvault-common/src/error.rs
// ================================================================

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Malformed or missing mandatory input (e.g. no protocol/host in the
    /// credential request). Fatal, never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Interaction is disabled: {0}")]
    InteractionDisabled(String),

    #[error("No provider found: {0}")]
    NoProviderFound(String),

    /// The remote identity provider explicitly refused us (OAuth
    /// `access_denied`, terminal two-factor failure, expired device code).
    #[error("Authentication declined: {0}")]
    AuthenticationDeclined(String),

    #[error("Helper error: {0}")]
    Helper(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Key derivation error: {0}")]
    KeyDerivation(String),

    #[error("Encryption error: {0}")]
    Encryption(String),

    #[error("Decryption error: {0}")]
    Decryption(String),

    /// A remote endpoint answered with a non-success status. Carries enough
    /// context (endpoint, status, server body) to diagnose.
    #[error("HTTP {status} from {url}: {message}")]
    Endpoint {
        url: String,
        status: u16,
        message: String,
    },

    #[error("Operation cancelled: {0}")]
    Cancelled(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Timeout error: {0}")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

impl From<String> for Error {
    fn from(s: String) -> Self {
        Error::Parse(s)
    }
}

impl From<&str> for Error {
    fn from(s: &str) -> Self {
        Error::Parse(s.to_string())
    }
}

impl From<keyring::Error> for Error {
    fn from(err: keyring::Error) -> Self {
        Error::Store(format!("keyring error: {}", err))
    }
}

impl From<anyhow::Error> for Error {
    fn from(e: anyhow::Error) -> Self {
        Error::Parse(e.to_string())
    }
}
