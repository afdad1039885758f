// Interfaces to the third-party geocoding/venue provider.
//
// Implementations live outside the core; the core only relies on the
// request/response shapes and the status semantics defined here.

use thiserror::Error;

pub mod geocode;
pub mod venues;

#[derive(Debug, Error)]
pub enum Error {
    /// The provider answered with a non-success status.
    #[error("provider status {0}")]
    Provider(String),
    /// The provider could not be reached at all.
    #[error(transparent)]
    Transport(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
