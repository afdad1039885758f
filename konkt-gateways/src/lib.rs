//! # konkt-gateways
//!
//! Concrete gateway implementations: the HTTP client for the
//! geocoding/venue provider and the persistent key-value stores
//! backing the cache.

mod http;
mod json_store;
mod mem_store;
pub mod wire;

pub use self::{http::HttpProviderGateway, json_store::JsonFileStore, mem_store::InMemoryStore};
