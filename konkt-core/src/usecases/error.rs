use thiserror::Error;

use crate::{gateways, quota::QuotaError};

#[derive(Debug, Error)]
pub enum Error {
    #[error("empty address input")]
    EmptyInput,
    #[error(transparent)]
    RateLimited(#[from] QuotaError),
    #[error("provider call timed out")]
    Timeout,
    #[error("no location found for {address:?} ({status})")]
    NotFound { address: String, status: String },
    #[error("provider unavailable ({status})")]
    ProviderUnavailable { status: String },
    #[error("{failed} of {attempted} provider calls failed")]
    PartialFailure { attempted: usize, failed: usize },
    /// The outcome of an in-flight operation was discarded because a
    /// newer one superseded it.
    #[error("superseded by a newer search")]
    Superseded,
}

impl Error {
    /// Whether the caller should surface a "quota exhausted" state
    /// instead of a generic "try again".
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl From<gateways::Error> for Error {
    fn from(err: gateways::Error) -> Self {
        match err {
            gateways::Error::Provider(status) => Self::ProviderUnavailable { status },
            gateways::Error::Transport(err) => Self::ProviderUnavailable {
                status: err.to_string(),
            },
        }
    }
}
