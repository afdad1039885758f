use std::{
    collections::HashMap,
    sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use konkt_core::store::{Error, KeyValueStore};

/// An in-memory [`KeyValueStore`] for ephemeral sessions: nothing
/// survives the process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl InMemoryStore {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, String>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poison_err) => {
                log::error!("A poisoned read lock for the in-memory store was found.");
                poison_err.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, String>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poison_err) => {
                log::error!("A poisoned write lock for the in-memory store was found.");
                poison_err.into_inner()
            }
        }
    }
}

impl KeyValueStore for InMemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.read().get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        self.write().insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        self.write().remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.read().keys().cloned().collect())
    }
}
