mod debounce;
mod enrich;
mod error;
mod paginate;
mod resolve_address;
mod search_venues;
mod suggest;

pub type Result<T> = std::result::Result<T, Error>;

pub use self::{
    debounce::*, enrich::*, error::Error, paginate::*, resolve_address::*, search_venues::*,
    suggest::*,
};
