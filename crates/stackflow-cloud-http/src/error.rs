//! HTTP provider error types

use stackflow_engine::ProviderError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HttpProviderError {
    #[error("API token is not configured. Set DANUBEDATA_API_TOKEN or provider.api_token")]
    MissingToken,

    #[error("Invalid base URL '{0}'")]
    InvalidBaseUrl(String),

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("'{resource_type}' response carries no resource id")]
    MissingId { resource_type: String },

    #[error("Unexpected response: {0}")]
    InvalidResponse(String),
}

impl HttpProviderError {
    /// Whether repeating the request may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            HttpProviderError::Request(e) => e.is_connect() || e.is_timeout(),
            HttpProviderError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Whether the server provably did not act on the request
    pub fn is_unprocessed(&self) -> bool {
        match self {
            HttpProviderError::Request(e) => e.is_connect(),
            HttpProviderError::Api { status, .. } => *status == 429,
            _ => false,
        }
    }
}

impl From<HttpProviderError> for ProviderError {
    fn from(err: HttpProviderError) -> Self {
        ProviderError {
            message: err.to_string(),
            retryable: err.is_retryable(),
            partial_outputs: None,
        }
    }
}

pub type Result<T> = std::result::Result<T, HttpProviderError>;
