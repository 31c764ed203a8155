//! Key-value storage tiers.

use std::collections::HashMap;
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::StorageError;

/// A string-keyed store of raw JSON text.
pub trait KeyValueStore: Send + Sync {
    /// Store a raw value under `key`, replacing any previous value.
    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Fetch the raw value under `key`.
    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// Remove every key.
    fn clear(&self) -> Result<(), StorageError>;
}

/// Typed JSON access over any [`KeyValueStore`].
pub trait StoreExt: KeyValueStore {
    /// Serialize `value` as JSON and store it.
    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.put_raw(key, &json)
    }

    /// Load and parse the value under `key`.
    ///
    /// Missing keys, read failures and parse failures all yield `None`; the
    /// latter two are logged.
    fn load<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = match self.get_raw(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(e) => {
                warn!(key, error = %e, "failed to read stored value");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key, error = %e, "discarding unparseable stored value");
                None
            }
        }
    }
}

impl<S: KeyValueStore + ?Sized> StoreExt for S {}

/// In-process store. Contents live as long as the value.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the store is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.write().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().get(key).cloned())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.write().remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries.write().clear();
        Ok(())
    }
}

/// Durable store keeping one `<key>.json` file per key.
///
/// Writes go to a hidden temp file first and are renamed into place, so a
/// crash never leaves a half-written value behind. Every write gets its own
/// temp file; concurrent writers of one key never share one.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "opened json file store");
        Ok(Self { dir })
    }

    /// Root directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        validate_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }

    fn temp_file_for(&self, key: &str) -> Result<NamedTempFile, StorageError> {
        let temp = tempfile::Builder::new()
            .prefix(&format!(".{key}."))
            .suffix(".tmp")
            .tempfile_in(&self.dir)?;
        Ok(temp)
    }
}

fn validate_key(key: &str) -> Result<(), StorageError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidKey(key.to_string()))
    }
}

impl KeyValueStore for JsonFileStore {
    fn put_raw(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        let mut temp = self.temp_file_for(key)?;
        temp.write_all(value.as_bytes())?;
        temp.persist(&path).map_err(|e| StorageError::from(e.error))?;
        Ok(())
    }

    fn get_raw(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn clear(&self) -> Result<(), StorageError> {
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                fs::remove_file(&path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;
    use test_case::test_case;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        name: String,
        count: u32,
    }

    fn sample() -> Sample {
        Sample {
            name: "cpu".into(),
            count: 3,
        }
    }

    #[test]
    fn memory_store_typed_access() {
        let store = MemoryStore::new();
        store.save("vaio_sample", &sample()).expect("save");
        assert_eq!(store.load::<Sample>("vaio_sample"), Some(sample()));
        assert_eq!(store.len(), 1);

        store.remove("vaio_sample").expect("remove");
        assert!(store.load::<Sample>("vaio_sample").is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn load_returns_none_on_garbage() {
        let store = MemoryStore::new();
        store.put_raw("vaio_sample", "{not json").expect("put");
        assert!(store.load::<Sample>("vaio_sample").is_none());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("open");

        store.save("vaio_sample", &sample()).expect("save");
        assert!(dir.path().join("vaio_sample.json").exists());
        let leftovers = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);

        let reopened = JsonFileStore::open(dir.path()).expect("reopen");
        assert_eq!(reopened.load::<Sample>("vaio_sample"), Some(sample()));
    }

    #[test]
    fn file_store_missing_key_and_remove() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("open");

        assert!(store.get_raw("vaio_missing").expect("get").is_none());
        store.remove("vaio_missing").expect("remove missing");
    }

    #[test]
    fn file_store_clear_keeps_foreign_files() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("open");
        store.put_raw("vaio_a", "1").expect("put");
        store.put_raw("vaio_b", "2").expect("put");
        fs::write(dir.path().join("notes.txt"), "keep").expect("write");

        store.clear().expect("clear");

        assert!(store.get_raw("vaio_a").expect("get").is_none());
        assert!(dir.path().join("notes.txt").exists());
    }

    #[test]
    fn file_store_concurrent_writers_of_one_key() {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("open");
        let values: Vec<String> = (0..8)
            .map(|n| {
                let pad = "x".repeat(4096 * (n + 1));
                serde_json::json!({"writer": n, "pad": pad}).to_string()
            })
            .collect();

        std::thread::scope(|scope| {
            for value in &values {
                let store = &store;
                scope.spawn(move || {
                    for _ in 0..20 {
                        store.put_raw("vaio_layouts", value).expect("put");
                    }
                });
            }
        });

        let stored = store.get_raw("vaio_layouts").expect("get").expect("value");
        assert!(values.contains(&stored));
        let leftovers = fs::read_dir(dir.path())
            .expect("read dir")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[test_case("" ; "empty")]
    #[test_case("../escape" ; "path traversal")]
    #[test_case("a/b" ; "slash")]
    #[test_case("a b" ; "space")]
    fn file_store_rejects_bad_keys(key: &str) {
        let dir = TempDir::new().expect("tempdir");
        let store = JsonFileStore::open(dir.path()).expect("open");
        assert!(matches!(store.put_raw(key, "1"), Err(StorageError::InvalidKey(_))));
    }
}
