//! Error types for the IBM Cloud clients.

use pvcheck_core::CheckError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{method} {url} returned {status}: {body}")]
    Status {
        method: &'static str,
        url: String,
        status: u16,
        body: String,
    },

    #[error("decode: {0}")]
    Decode(String),

    /// The API key was rejected or no token could be obtained.
    #[error("authentication: {0}")]
    Auth(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<ApiError> for CheckError {
    fn from(e: ApiError) -> Self {
        match e {
            ApiError::Auth(message) => CheckError::Setup(message),
            other => CheckError::Provider(other.to_string()),
        }
    }
}
