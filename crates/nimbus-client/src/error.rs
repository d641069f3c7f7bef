//! Nimbus client errors

use thiserror::Error;

/// Errors that can occur when talking to the Nimbus backend
#[derive(Debug, Error)]
pub enum NimbusError {
    /// HTTP request/response error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Nimbus API returned an error status
    #[error("Nimbus API error: {0}")]
    Api(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Login discovery did not behave like a redirect-driven login page
    #[error("Auth discovery failed: {0}")]
    AuthDiscovery(String),

    /// The login form rejected the credentials
    #[error("Authentication failed: {0}")]
    AuthCredential(String),

    /// The token response body was not the expected JSON shape
    #[error("Token response malformed: {0}")]
    AuthParsing(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid request (e.g. a token that cannot be used as a header value)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}
