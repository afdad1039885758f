use std::io;

use thiserror::Error;

pub use konkt_core::usecases::Error as CoreError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Whether the caller should render a "come back later" state
    /// instead of a generic failure.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_rate_limited())
    }
}
