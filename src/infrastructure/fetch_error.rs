//! Errors raised while fetching listing pages and price quotes

use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    #[error("Rate limited by {url}")]
    RateLimited {
        url: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response body from {url}: {message}")]
    InvalidBody { url: String, message: String },

    #[error("Request cancelled: {url}")]
    Cancelled { url: String },

    #[error("Invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

impl FetchError {
    /// Transport failures, 5xx and 429 are worth another attempt
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport { source, .. } => !source.is_builder() && !source.is_redirect(),
            Self::Status { status, .. } => *status >= 500,
            Self::RateLimited { .. } => true,
            Self::InvalidBody { .. } | Self::Cancelled { .. } | Self::InvalidUrl { .. } => false,
        }
    }

    /// Server-requested wait, when the response carried one
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Transport { url, .. }
            | Self::Status { url, .. }
            | Self::RateLimited { url, .. }
            | Self::InvalidBody { url, .. }
            | Self::Cancelled { url }
            | Self::InvalidUrl { url, .. } => url,
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
