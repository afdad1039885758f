use std::{fmt, io, path::Path};

use jfs::Store;
use serde::{Deserialize, Serialize};

use konkt_core::store::{Error, KeyValueStore};

/// A persistent [`KeyValueStore`] writing one JSON file per entry.
///
/// Logical keys may contain arbitrary characters (addresses, rounded
/// coordinates), so they are base58-encoded into file-safe ids and
/// kept alongside the payload for enumeration.
#[derive(Clone)]
pub struct JsonFileStore {
    json_store: Store,
}

impl fmt::Debug for JsonFileStore {
    fn fmt(&self, f: &mut fmt::Formatter) -> Result<(), fmt::Error> {
        f.debug_struct("JsonFileStore")
            .field("path", &self.json_store.path())
            .finish()
    }
}

impl JsonFileStore {
    pub fn try_new<P: AsRef<Path>>(directory: P) -> io::Result<Self> {
        let json_store = Store::new(directory)?;
        Ok(Self { json_store })
    }

    pub fn path(&self) -> &Path {
        self.json_store.path()
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    key: String,
    payload: String,
}

fn file_id(key: &str) -> String {
    bs58::encode(key.as_bytes()).into_string()
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Result<Option<String>, Error> {
        match self.json_store.get::<StoredEntry>(&file_id(key)) {
            Ok(entry) => Ok(Some(entry.payload)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    fn put(&self, key: &str, value: &str) -> Result<(), Error> {
        let entry = StoredEntry {
            key: key.to_owned(),
            payload: value.to_owned(),
        };
        self.json_store.save_with_id(&entry, &file_id(key))?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), Error> {
        match self.json_store.delete(&file_id(key)) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    fn keys(&self) -> Result<Vec<String>, Error> {
        let entries = self.json_store.all::<StoredEntry>()?;
        Ok(entries.into_values().map(|entry| entry.key).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_with_awkward_keys() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::try_new(dir.path()).unwrap();

        let key = "konkt_geocode_100 Queen St W / Toronto";
        store.put(key, "payload").unwrap();
        assert_eq!(Some("payload".to_owned()), store.get(key).unwrap());

        let mut keys = store.keys().unwrap();
        keys.sort_unstable();
        assert_eq!(vec![key.to_owned()], keys);

        store.remove(key).unwrap();
        assert_eq!(None, store.get(key).unwrap());
        // Removing a missing key is not an error.
        store.remove(key).unwrap();
    }

    #[test]
    fn entries_survive_reopening_the_store() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = JsonFileStore::try_new(dir.path()).unwrap();
            store.put("konkt_rate_limit", "{\"calls\":3}").unwrap();
        }
        let reopened = JsonFileStore::try_new(dir.path()).unwrap();
        assert_eq!(
            Some("{\"calls\":3}".to_owned()),
            reopened.get("konkt_rate_limit").unwrap()
        );
    }
}
