use reqwest::StatusCode;
use thiserror::Error;

pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Failure reasons surfaced by the repository providers.
///
/// Listing operations swallow these and return an empty collection, single-entity
/// operations hand them back so callers can tell a bad token from a missing file.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Transport failure or a 5xx from the provider
    #[error("Provider unavailable: {0}")]
    Unavailable(String),

    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Operation cancelled")]
    Cancelled,
}

impl ProviderError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedResponse(msg.into())
    }

    /// Stable identifier used in RPC error payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unauthorized(_) => "unauthorized",
            Self::NotFound(_) => "not_found",
            Self::RateLimited(_) => "rate_limited",
            Self::Unavailable(_) => "unavailable",
            Self::Http { .. } => "http",
            Self::MalformedResponse(_) => "malformed_response",
            Self::InvalidInput(_) => "invalid_input",
            Self::Cancelled => "cancelled",
        }
    }

    /// Map a non-success status to an error kind.
    ///
    /// `rate_limit_exhausted` is true when the provider reported zero remaining
    /// requests, which turns GitHub's 403 into a rate limit instead of an auth failure.
    pub fn from_status(status: StatusCode, rate_limit_exhausted: bool, body: String) -> Self {
        match status.as_u16() {
            401 => Self::Unauthorized(body),
            403 if rate_limit_exhausted => Self::RateLimited(body),
            403 => Self::Unauthorized(body),
            404 => Self::NotFound(body),
            429 => Self::RateLimited(body),
            500..=599 => Self::Unavailable(format!("{}: {}", status, body)),
            code => Self::Http {
                status: code,
                message: body,
            },
        }
    }
}
