//! Persistence of per-image calibration scales.

mod backend;
mod calibration_store;

pub use backend::{FileBackend, KeyValueBackend, MemoryBackend, StorageError};
pub use calibration_store::{
    CalibrationStore, CalibrationTable, DegradeReason, StoreOutcome, CALIBRATION_SCALE_KEY,
};
