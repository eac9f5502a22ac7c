//! Per-image calibration scale factors kept in a single persisted record.
//!
//! The whole table lives under one storage key as a JSON object mapping
//! image ids to scale factors. Every mutation reloads the record, applies one
//! change and writes the whole object back. Failures of the medium are never
//! raised: they come back as [`StoreOutcome::Degraded`] and are logged.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use super::backend::{KeyValueBackend, MemoryBackend};
use crate::calibration::round2;

/// Default storage key of the calibration record.
pub const CALIBRATION_SCALE_KEY: &str = "ohif_calibration_scale";

/// Mapping from image id to scale factor.
pub type CalibrationTable = HashMap<String, f64>;

/// Why a store operation fell back instead of completing normally.
#[derive(Debug, Clone, PartialEq)]
pub enum DegradeReason {
    /// The persisted record could not be parsed or held invalid entries.
    Malformed(String),
    /// The medium failed to return the record.
    ReadFailed(String),
    /// The medium rejected a write or delete.
    WriteFailed(String),
    /// The scale to save was not a finite positive number.
    InvalidScale(f64),
}

impl fmt::Display for DegradeReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(e) => write!(f, "malformed calibration record: {}", e),
            Self::ReadFailed(e) => write!(f, "failed to read calibration record: {}", e),
            Self::WriteFailed(e) => write!(f, "failed to write calibration record: {}", e),
            Self::InvalidScale(s) => write!(f, "refusing to store invalid scale {}", s),
        }
    }
}

/// Result of a store operation that never fails outright.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreOutcome<T> {
    Ok(T),
    Degraded { value: T, reason: DegradeReason },
}

impl<T> StoreOutcome<T> {
    pub fn value(&self) -> &T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn into_value(self) -> T {
        match self {
            Self::Ok(value) | Self::Degraded { value, .. } => value,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }

    pub fn reason(&self) -> Option<&DegradeReason> {
        match self {
            Self::Ok(_) => None,
            Self::Degraded { reason, .. } => Some(reason),
        }
    }
}

fn is_valid_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

/// Durable image-id to scale-factor store.
pub struct CalibrationStore {
    backend: Arc<dyn KeyValueBackend>,
    key: String,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl CalibrationStore {
    /// Create a store over `backend` using the default storage key.
    pub fn new(backend: Arc<dyn KeyValueBackend>) -> Self {
        Self {
            backend,
            key: CALIBRATION_SCALE_KEY.to_string(),
            write_lock: Mutex::new(()),
        }
    }

    /// Create a store backed by a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Use a different storage key.
    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    /// The storage key the table lives under.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Load the whole table.
    ///
    /// A missing, unreadable or unparsable record yields an empty table.
    /// Entries whose value is not a positive number are dropped individually.
    pub fn load(&self) -> StoreOutcome<CalibrationTable> {
        let content = match self.backend.read(&self.key) {
            Ok(Some(content)) => content,
            Ok(None) => return StoreOutcome::Ok(CalibrationTable::new()),
            Err(e) => {
                tracing::warn!("Failed to read calibration scales: {}", e);
                return StoreOutcome::Degraded {
                    value: CalibrationTable::new(),
                    reason: DegradeReason::ReadFailed(e.to_string()),
                };
            }
        };

        let parsed: HashMap<String, serde_json::Value> = match serde_json::from_str(&content) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Failed to parse calibration scales: {}", e);
                return StoreOutcome::Degraded {
                    value: CalibrationTable::new(),
                    reason: DegradeReason::Malformed(e.to_string()),
                };
            }
        };

        let total = parsed.len();
        let table: CalibrationTable = parsed
            .into_iter()
            .filter_map(|(image_id, scale)| {
                scale
                    .as_f64()
                    .filter(|scale| is_valid_scale(*scale))
                    .map(|scale| (image_id, scale))
            })
            .collect();

        if table.len() < total {
            let dropped = total - table.len();
            tracing::warn!("Dropped {} invalid calibration scale(s)", dropped);
            return StoreOutcome::Degraded {
                value: table,
                reason: DegradeReason::Malformed(format!(
                    "{} entries without a positive numeric scale",
                    dropped
                )),
            };
        }

        StoreOutcome::Ok(table)
    }

    /// Save `scale` for `image_id`, rounded to 2 decimal places.
    pub fn save(&self, image_id: &str, scale: f64) -> StoreOutcome<()> {
        let rounded = round2(scale);
        if !is_valid_scale(rounded) {
            tracing::warn!(
                "Not saving calibration scale {} for image {}: not a positive number",
                scale,
                image_id
            );
            return StoreOutcome::Degraded {
                value: (),
                reason: DegradeReason::InvalidScale(scale),
            };
        }

        let _guard = self.lock_writes();
        let mut table = match self.load() {
            // Writing now would replace a record that may still be intact.
            StoreOutcome::Degraded {
                reason: reason @ DegradeReason::ReadFailed(_),
                ..
            } => return StoreOutcome::Degraded { value: (), reason },
            loaded => loaded.into_value(),
        };
        table.insert(image_id.to_string(), rounded);

        let outcome = self.write_table(&table);
        if !outcome.is_degraded() {
            tracing::info!("Calibration scale {} saved for image {}", rounded, image_id);
        }
        outcome
    }

    /// Scale stored for `image_id`, `None` if absent or unreadable.
    pub fn get(&self, image_id: &str) -> Option<f64> {
        self.get_outcome(image_id).into_value()
    }

    /// Like [`get`](Self::get) but reports whether the read degraded.
    pub fn get_outcome(&self, image_id: &str) -> StoreOutcome<Option<f64>> {
        match self.load() {
            StoreOutcome::Ok(table) => StoreOutcome::Ok(table.get(image_id).copied()),
            StoreOutcome::Degraded { value, reason } => StoreOutcome::Degraded {
                value: value.get(image_id).copied(),
                reason,
            },
        }
    }

    /// Scale to apply for `image_id`: the stored override or `1.0`.
    pub fn scale_or_default(&self, image_id: &str) -> f64 {
        self.get(image_id).unwrap_or(1.0)
    }

    /// Snapshot of every stored scale. Later mutations are not reflected.
    pub fn list_all(&self) -> CalibrationTable {
        self.load().into_value()
    }

    /// Clear one image's scale, or the whole record when `image_id` is `None`.
    ///
    /// Clearing something that is not stored is a no-op.
    pub fn clear(&self, image_id: Option<&str>) -> StoreOutcome<()> {
        let _guard = self.lock_writes();

        let Some(image_id) = image_id else {
            return match self.backend.remove(&self.key) {
                Ok(()) => {
                    tracing::info!("All calibration scales cleared");
                    StoreOutcome::Ok(())
                }
                Err(e) => {
                    tracing::warn!("Failed to clear calibration scales: {}", e);
                    StoreOutcome::Degraded {
                        value: (),
                        reason: DegradeReason::WriteFailed(e.to_string()),
                    }
                }
            };
        };

        let loaded = self.load();
        let degraded_read = loaded.reason().cloned();
        let mut table = loaded.into_value();

        if table.remove(image_id).is_none() {
            // Nothing to remove; leave the record untouched.
            return match degraded_read {
                Some(reason) => StoreOutcome::Degraded { value: (), reason },
                None => StoreOutcome::Ok(()),
            };
        }

        let outcome = self.write_table(&table);
        if !outcome.is_degraded() {
            tracing::info!("Calibration scale cleared for image {}", image_id);
        }
        outcome
    }

    /// Log every stored scale and return them.
    pub fn log_all(&self) -> CalibrationTable {
        let table = self.list_all();
        if table.is_empty() {
            tracing::info!("No calibration scales stored");
        }
        let mut entries: Vec<_> = table.iter().collect();
        entries.sort_by(|a, b| a.0.cmp(b.0));
        for (image_id, scale) in entries {
            tracing::info!("Calibration scale for {}: {}", image_id, scale);
        }
        table
    }

    fn write_table(&self, table: &CalibrationTable) -> StoreOutcome<()> {
        let content = match serde_json::to_string(table) {
            Ok(content) => content,
            Err(e) => {
                tracing::warn!("Failed to serialize calibration scales: {}", e);
                return StoreOutcome::Degraded {
                    value: (),
                    reason: DegradeReason::WriteFailed(e.to_string()),
                };
            }
        };

        match self.backend.write(&self.key, &content) {
            Ok(()) => StoreOutcome::Ok(()),
            Err(e) => {
                tracing::warn!("Failed to save calibration scales: {}", e);
                StoreOutcome::Degraded {
                    value: (),
                    reason: DegradeReason::WriteFailed(e.to_string()),
                }
            }
        }
    }

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl fmt::Debug for CalibrationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CalibrationStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileBackend;
    use std::env;
    use std::fs;

    fn store_with(backend: MemoryBackend) -> (Arc<MemoryBackend>, CalibrationStore) {
        let backend = Arc::new(backend);
        let store = CalibrationStore::new(backend.clone());
        (backend, store)
    }

    #[test]
    fn test_save_rounds_to_two_decimals() {
        let store = CalibrationStore::in_memory();
        assert!(!store.save("img-1", 2.567).is_degraded());
        assert_eq!(store.get("img-1"), Some(2.57));
    }

    #[test]
    fn test_get_unknown_is_none() {
        let store = CalibrationStore::in_memory();
        assert_eq!(store.get("missing"), None);
        assert_eq!(store.scale_or_default("missing"), 1.0);
    }

    #[test]
    fn test_list_all_contains_both_entries() {
        let store = CalibrationStore::in_memory();
        store.save("a", 1.5);
        store.save("b", 0.75);

        let all = store.list_all();
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("a"), Some(&1.5));
        assert_eq!(all.get("b"), Some(&0.75));
    }

    #[test]
    fn test_save_overwrites_existing_entry() {
        let store = CalibrationStore::in_memory();
        store.save("a", 1.5);
        store.save("a", 2.0);
        assert_eq!(store.get("a"), Some(2.0));
        assert_eq!(store.list_all().len(), 1);
    }

    #[test]
    fn test_clear_is_idempotent() {
        let store = CalibrationStore::in_memory();
        store.save("a", 1.5);
        store.save("b", 3.0);

        assert_eq!(store.clear(Some("a")), StoreOutcome::Ok(()));
        let after_first = store.list_all();
        assert_eq!(store.clear(Some("a")), StoreOutcome::Ok(()));
        let after_second = store.list_all();

        assert_eq!(after_first, after_second);
        assert_eq!(store.get("a"), None);
        assert_eq!(store.get("b"), Some(3.0));
    }

    #[test]
    fn test_clear_all_removes_record() {
        let (backend, store) = store_with(MemoryBackend::new());
        store.save("a", 1.5);
        assert!(backend.raw(CALIBRATION_SCALE_KEY).is_some());

        assert_eq!(store.clear(None), StoreOutcome::Ok(()));
        assert!(backend.raw(CALIBRATION_SCALE_KEY).is_none());
        assert!(store.list_all().is_empty());

        // Clearing an absent record is fine
        assert_eq!(store.clear(None), StoreOutcome::Ok(()));
    }

    #[test]
    fn test_malformed_record_loads_empty() {
        let (_, store) =
            store_with(MemoryBackend::new().with_record(CALIBRATION_SCALE_KEY, "{not json"));

        let outcome = store.load();
        assert!(outcome.value().is_empty());
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::Malformed(_))
        ));
        assert_eq!(store.get("anything"), None);
    }

    #[test]
    fn test_non_object_record_loads_empty() {
        let (_, store) =
            store_with(MemoryBackend::new().with_record(CALIBRATION_SCALE_KEY, "[1,2]"));
        let outcome = store.load();
        assert!(outcome.is_degraded());
        assert!(outcome.value().is_empty());
    }

    #[test]
    fn test_invalid_entries_are_dropped() {
        let (_, store) = store_with(
            MemoryBackend::new().with_record(CALIBRATION_SCALE_KEY, r#"{"a":1.25,"b":0,"c":-2}"#),
        );

        let outcome = store.load();
        assert!(outcome.is_degraded());
        assert_eq!(outcome.value().len(), 1);
        assert_eq!(store.get("a"), Some(1.25));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_non_numeric_entries_are_dropped_like_non_positive() {
        let (backend, store) = store_with(
            MemoryBackend::new()
                .with_record(CALIBRATION_SCALE_KEY, r#"{"a":1.25,"b":"x","c":null}"#),
        );

        let outcome = store.load();
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::Malformed(_))
        ));
        assert_eq!(outcome.value().len(), 1);
        assert_eq!(store.get("a"), Some(1.25));

        // The next save keeps the surviving entry and drops the bad ones
        assert_eq!(store.save("d", 2.0), StoreOutcome::Ok(()));
        let raw = backend.raw(CALIBRATION_SCALE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "a": 1.25, "d": 2.0 }));
    }

    #[test]
    fn test_read_failure_loads_empty() {
        let (backend, store) = store_with(MemoryBackend::new());
        store.save("a", 1.5);
        backend.set_reject_reads(true);

        let outcome = store.load();
        assert!(outcome.value().is_empty());
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::ReadFailed(_))
        ));
        assert_eq!(store.get("a"), None);
        assert!(store.get_outcome("a").is_degraded());
        assert_eq!(store.scale_or_default("a"), 1.0);
    }

    #[test]
    fn test_save_after_read_failure_keeps_record() {
        let (backend, store) = store_with(MemoryBackend::new());
        store.save("a", 1.5);
        backend.set_reject_reads(true);

        let outcome = store.save("b", 2.0);
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::ReadFailed(_))
        ));
        assert!(store.clear(Some("a")).is_degraded());

        backend.set_reject_reads(false);
        assert_eq!(store.get("a"), Some(1.5));
        assert_eq!(store.get("b"), None);
    }

    #[test]
    fn test_concurrent_saves_keep_every_entry() {
        let store = Arc::new(CalibrationStore::in_memory());

        let handles: Vec<_> = (0..8)
            .map(|thread| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..20 {
                        let outcome = store.save(&format!("img-{}-{}", thread, i), 1.5);
                        assert!(!outcome.is_degraded());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let all = store.list_all();
        assert_eq!(all.len(), 8 * 20);
        for thread in 0..8 {
            for i in 0..20 {
                assert_eq!(all.get(&format!("img-{}-{}", thread, i)), Some(&1.5));
            }
        }
    }

    #[test]
    fn test_save_over_malformed_record_recovers() {
        let (_, store) =
            store_with(MemoryBackend::new().with_record(CALIBRATION_SCALE_KEY, "oops"));
        assert_eq!(store.save("a", 1.1), StoreOutcome::Ok(()));
        assert_eq!(
            store.load(),
            StoreOutcome::Ok(CalibrationTable::from([("a".to_string(), 1.1)]))
        );
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let (backend, store) = store_with(MemoryBackend::new());
        store.save("a", 1.5);
        backend.set_reject_writes(true);

        let outcome = store.save("b", 2.0);
        assert!(matches!(
            outcome.reason(),
            Some(DegradeReason::WriteFailed(_))
        ));
        assert_eq!(store.get("b"), None);
        assert_eq!(store.get("a"), Some(1.5));

        assert!(store.clear(Some("a")).is_degraded());
        assert!(store.clear(None).is_degraded());
        assert_eq!(store.get("a"), Some(1.5));
    }

    #[test]
    fn test_invalid_scale_is_not_written() {
        let (backend, store) = store_with(MemoryBackend::new());
        for scale in [f64::INFINITY, f64::NAN, 0.0, -1.0, 0.001] {
            let outcome = store.save("a", scale);
            assert!(matches!(
                outcome.reason(),
                Some(DegradeReason::InvalidScale(_))
            ));
        }
        assert!(backend.raw(CALIBRATION_SCALE_KEY).is_none());
    }

    #[test]
    fn test_record_is_plain_json_object() {
        let (backend, store) = store_with(MemoryBackend::new());
        store.save("img", 1.2);

        let raw = backend.raw(CALIBRATION_SCALE_KEY).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, serde_json::json!({ "img": 1.2 }));
    }

    #[test]
    fn test_custom_key() {
        let (backend, store) = store_with(MemoryBackend::new());
        let store = store.with_key("my_scales");
        store.save("img", 1.2);
        assert_eq!(store.key(), "my_scales");
        assert!(backend.raw("my_scales").is_some());
        assert!(backend.raw(CALIBRATION_SCALE_KEY).is_none());
    }

    #[test]
    fn test_log_all_returns_snapshot() {
        let store = CalibrationStore::in_memory();
        store.save("a", 1.5);
        let logged = store.log_all();
        store.save("b", 2.5);
        assert_eq!(logged.len(), 1);
    }

    #[test]
    fn test_file_backed_persistence() {
        let root = env::temp_dir().join(format!(
            "spacing_calibration_store_{}",
            std::process::id()
        ));

        let store = CalibrationStore::new(Arc::new(FileBackend::new(&root)));
        store.save("type_a", 1.234);
        store.save("type_b", 0.5);

        // A second store over the same directory sees the same table
        let reopened = CalibrationStore::new(Arc::new(FileBackend::new(&root)));
        assert_eq!(reopened.get("type_a"), Some(1.23));
        assert_eq!(reopened.get("type_b"), Some(0.5));

        reopened.clear(None);
        assert!(store.list_all().is_empty());

        let _ = fs::remove_dir_all(&root);
    }
}
