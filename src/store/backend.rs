//! Key-value media the calibration store can persist into.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use thiserror::Error;

/// Errors raised by a storage medium.
///
/// These never leave [`CalibrationStore`](super::CalibrationStore); it turns
/// them into degraded outcomes.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid storage key: {0}")]
    InvalidKey(String),
    #[error("Write rejected by storage medium: {0}")]
    Rejected(String),
}

/// A persistent string-to-string medium addressed by key.
pub trait KeyValueBackend: Send + Sync {
    /// Read the record under `key`, `None` if it was never written.
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the whole record under `key`.
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the record under `key`. Deleting a missing record succeeds.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

/// Stores each key as `<root>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileBackend {
    root: PathBuf,
}

impl FileBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn record_path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty()
            || key == "."
            || key == ".."
            || key.contains(|c: char| c == '/' || c == '\\')
        {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(format!("{}.json", key)))
    }
}

impl KeyValueBackend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        let path = self.record_path(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.record_path(key)?;
        fs::create_dir_all(&self.root)?;

        // Readers see either the old record or the new one, never a torn write.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let path = self.record_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Process-local medium, used for tests and sessions that should not persist.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, String>>,
    reject_writes: AtomicBool,
    reject_reads: AtomicBool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a raw record, bypassing any write rejection.
    pub fn with_record(self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.lock().insert(key.into(), value.into());
        self
    }

    /// Make every following write and remove fail, like a full or disabled medium.
    pub fn set_reject_writes(&self, reject: bool) {
        self.reject_writes.store(reject, Ordering::SeqCst);
    }

    /// Make every following read fail, like an unavailable medium.
    pub fn set_reject_reads(&self, reject: bool) {
        self.reject_reads.store(reject, Ordering::SeqCst);
    }

    /// Raw record under `key`, for inspection.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.reject_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Rejected("quota exceeded".to_string()));
        }
        Ok(())
    }
}

impl KeyValueBackend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        if self.reject_reads.load(Ordering::SeqCst) {
            return Err(StorageError::Io(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "storage unavailable",
            )));
        }
        Ok(self.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.check_writable()?;
        self.lock().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn temp_root(name: &str) -> PathBuf {
        env::temp_dir().join(format!(
            "spacing_calibration_backend_{}_{}",
            name,
            std::process::id()
        ))
    }

    #[test]
    fn test_file_backend_round_trip() {
        let root = temp_root("round_trip");
        let backend = FileBackend::new(&root);

        assert!(backend.read("scales").unwrap().is_none());

        backend.write("scales", r#"{"a":1.5}"#).unwrap();
        assert_eq!(backend.read("scales").unwrap().as_deref(), Some(r#"{"a":1.5}"#));
        assert!(root.join("scales.json").exists());
        assert!(!root.join("scales.json.tmp").exists());

        backend.remove("scales").unwrap();
        assert!(backend.read("scales").unwrap().is_none());

        // Removing again is fine
        backend.remove("scales").unwrap();

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn test_file_backend_rejects_path_keys() {
        let backend = FileBackend::new(temp_root("keys"));
        assert!(matches!(
            backend.read("../escape"),
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(backend.write("", "{}"), Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn test_memory_backend_rejects_writes_when_asked() {
        let backend = MemoryBackend::new().with_record("k", "v");
        backend.set_reject_writes(true);

        assert!(matches!(backend.write("k", "w"), Err(StorageError::Rejected(_))));
        assert!(backend.remove("k").is_err());
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("v"));

        backend.set_reject_writes(false);
        backend.write("k", "w").unwrap();
        assert_eq!(backend.raw("k").as_deref(), Some("w"));
    }

    #[test]
    fn test_memory_backend_rejects_reads_when_asked() {
        let backend = MemoryBackend::new().with_record("k", "v");
        backend.set_reject_reads(true);
        assert!(matches!(backend.read("k"), Err(StorageError::Io(_))));

        backend.set_reject_reads(false);
        assert_eq!(backend.read("k").unwrap().as_deref(), Some("v"));
    }
}
