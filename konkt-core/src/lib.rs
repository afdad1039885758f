//! # konkt-core
//!
//! The location-search orchestration core: expiring cache, call-quota
//! tracking, provider gateway interfaces, and the use cases that turn
//! two addresses into a deduplicated, detail-enriched, paged list of
//! venues around a fair meeting point.
//!
//! All shared state (cache, quota) is explicitly constructed and
//! passed by reference; there are no process-level singletons.

pub mod cache;
pub mod clock;
pub mod gateways;
pub mod quota;
pub mod store;
pub mod usecases;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub mod entities {
    pub use konkt_entities::{
        category::*, geo::*, geocoding::*, id::*, meeting::*, time::*, venue::*,
    };
}
