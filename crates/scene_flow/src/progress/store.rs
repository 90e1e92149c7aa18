use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage key must not be empty")]
    EmptyKey,
    #[error("storage key '{key}' contains invalid character '{character}'")]
    InvalidKey { key: String, character: char },
    #[error("failed to read '{path}': {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to remove '{path}': {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable string key-value storage, the local-storage equivalent the
/// router persists progress into.
pub trait ProgressStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;
    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key under a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        validate_storage_key(key)?;
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl ProgressStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(raw) => Ok(Some(raw)),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Read { path, source }),
        }
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        write_via_staging(&path, value).map_err(|source| StoreError::Write { path, source })
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StoreError::Remove { path, source }),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entry(mut self, key: &str, value: &str) -> Self {
        self.entries.insert(key.to_string(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ProgressStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        validate_storage_key(key)?;
        Ok(self.entries.get(key).cloned())
    }

    fn write(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        validate_storage_key(key)?;
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        validate_storage_key(key)?;
        self.entries.remove(key);
        Ok(())
    }
}

/// Writes `<file>.staged` next to `path` and renames it into place, so a
/// reader never sees a half-written save.
fn write_via_staging(path: &Path, value: &str) -> io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(dir)?;
    let staged = path.with_extension("json.staged");
    fs::write(&staged, value)?;
    fs::rename(&staged, path).inspect_err(|_| {
        let _ = fs::remove_file(&staged);
    })
}

fn validate_storage_key(key: &str) -> Result<(), StoreError> {
    if key.is_empty() {
        return Err(StoreError::EmptyKey);
    }
    for ch in key.chars() {
        if ch.is_ascii_alphanumeric() || matches!(ch, '_' | '-') {
            continue;
        }
        return Err(StoreError::InvalidKey {
            key: key.to_string(),
            character: ch,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_keys() {
        for key in ["onboarding-game-state", "slot_1", "A"] {
            assert!(validate_storage_key(key).is_ok(), "key={key}");
        }
    }

    #[test]
    fn rejects_path_like_keys() {
        for key in ["", "../x", "a/b", r"a\b", "a.b", "a b"] {
            assert!(validate_storage_key(key).is_err(), "key={key}");
        }
    }

    #[test]
    fn file_store_round_trips_and_removes() {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut store = FileStore::new(temp.path().join("saves"));

        assert_eq!(store.read("progress").expect("read missing"), None);
        store.write("progress", "{}").expect("write");
        assert_eq!(
            store.read("progress").expect("read").as_deref(),
            Some("{}")
        );
        assert!(temp.path().join("saves").join("progress.json").is_file());

        store.remove("progress").expect("remove");
        store.remove("progress").expect("remove twice is fine");
        assert_eq!(store.read("progress").expect("read after remove"), None);
    }

    #[test]
    fn file_store_overwrites_without_leaving_staging_files() {
        let temp = tempfile::tempdir().expect("tempdir");
        let dir = temp.path().join("nested").join("saves");
        let mut store = FileStore::new(&dir);

        store.write("progress", "first").expect("first write");
        store.write("progress", "second").expect("second write");

        assert_eq!(
            store.read("progress").expect("read").as_deref(),
            Some("second")
        );
        let names: Vec<_> = fs::read_dir(&dir)
            .expect("dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(names, ["progress.json"]);
    }

    #[test]
    fn memory_store_rejects_invalid_key() {
        let mut store = MemoryStore::new();
        assert!(matches!(
            store.write("a/b", "x"),
            Err(StoreError::InvalidKey { character: '/', .. })
        ));
        assert!(store.is_empty());
    }
}
