use std::time::Duration;

use serde::{de::DeserializeOwned, Deserialize, Serialize};

use konkt_entities::time::Timestamp;

use crate::{clock::Clock, store, store::KeyValueStore};

/// Prefix of every store key owned by this cache. Keys without this
/// prefix are never touched, even by [`Cache::sweep_expired`].
const KEY_PREFIX: &str = "konkt_";

/// Logical namespaces. Every cache consumer prefixes its keys with
/// one of these tags, so keys never collide across consumers.
pub const NS_GEOCODE: &str = "geocode_";
pub const NS_PLACES: &str = "places_";
pub const NS_RATE_LIMIT: &str = "rate_limit";
pub const NS_SUGGESTIONS: &str = "suggestions_";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    value: T,
    created_at: Timestamp,
    expires_at: Timestamp,
}

/// A generic key-value cache with per-entry TTL on top of a
/// persistent [`KeyValueStore`].
///
/// The cache itself is stateless: all entries live in the store and
/// expiry is decided on read. Corrupted entries are evicted and
/// reported as a miss, never as an error.
#[derive(Debug)]
pub struct Cache<S, C> {
    store: S,
    clock: C,
}

impl<S: KeyValueStore, C: Clock> Cache<S, C> {
    pub fn new(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) -> Result<(), store::Error> {
        let now = self.clock.now();
        let envelope = Envelope {
            value,
            created_at: now,
            expires_at: now + ttl,
        };
        let json = serde_json::to_string(&envelope).map_err(anyhow::Error::from)?;
        self.store.put(&prefixed(key), &json)
    }

    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let store_key = prefixed(key);
        let json = match self.store.get(&store_key) {
            Ok(Some(json)) => json,
            Ok(None) => return None,
            Err(err) => {
                log::warn!("Failed to read cache entry {store_key}: {err}");
                return None;
            }
        };
        match serde_json::from_str::<Envelope<T>>(&json) {
            Ok(envelope) => {
                if self.clock.now() <= envelope.expires_at {
                    Some(envelope.value)
                } else {
                    self.evict(&store_key);
                    None
                }
            }
            Err(err) => {
                log::warn!("Evicting corrupted cache entry {store_key}: {err}");
                self.evict(&store_key);
                None
            }
        }
    }

    /// Evict all expired and corrupted entries and return how many
    /// were removed. Periodic housekeeping, not required for
    /// correctness.
    pub fn sweep_expired(&self) -> usize {
        let keys = match self.store.keys() {
            Ok(keys) => keys,
            Err(err) => {
                log::warn!("Failed to enumerate cache keys: {err}");
                return 0;
            }
        };
        let now = self.clock.now();
        let mut evicted = 0;
        for key in keys {
            if !key.starts_with(KEY_PREFIX) {
                continue;
            }
            let stale = match self.store.get(&key) {
                Ok(Some(json)) => match serde_json::from_str::<Envelope<serde_json::Value>>(&json)
                {
                    Ok(envelope) => now > envelope.expires_at,
                    Err(_) => true,
                },
                Ok(None) => false,
                Err(_) => false,
            };
            if stale {
                self.evict(&key);
                evicted += 1;
            }
        }
        evicted
    }

    fn evict(&self, store_key: &str) {
        if let Err(err) = self.store.remove(store_key) {
            log::warn!("Failed to evict cache entry {store_key}: {err}");
        }
    }
}

fn prefixed(key: &str) -> String {
    format!("{KEY_PREFIX}{key}")
}
