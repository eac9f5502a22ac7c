// Copyright 2025 ModerRAS
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! # Spacing Calibration
//!
//! Re-calibrates the physical pixel spacing of an image from a reference line
//! of known length.
//!
//! The user draws a calibration line, the library measures it in world
//! coordinates and asks for the line's true physical length. The ratio of the
//! two is stored per image and the viewport is told to rescale.
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use spacing_calibration::{
//!     CalibrationLine, CalibrationStore, CalibrationWorkflow, InputDialog, InputPrompt,
//!     RecordingSurface, RenderingEngineId, WorkflowConfig,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(CalibrationStore::in_memory());
//!     let dialog: Arc<dyn InputDialog> = Arc::new(|_: &InputPrompt| Some("120".to_string()));
//!     let viewport = RecordingSurface::new(RenderingEngineId::new("default"));
//!
//!     let line = CalibrationLine::new("image-1", [0.0, 0.0, 0.0], [100.0, 0.0, 0.0]);
//!     let mut workflow =
//!         CalibrationWorkflow::new(WorkflowConfig::default(), store.clone(), Some(dialog));
//!     workflow.complete_calibration(&line, &viewport).await?;
//!
//!     assert_eq!(store.get("image-1"), Some(1.2));
//!     Ok(())
//! }
//! ```

pub mod calibration;
pub mod config;
pub mod dialog;
pub mod settings;
pub mod store;
pub mod viewport;

pub use calibration::{
    distance2, distance3, parse_length, AppliedCalibration, CalibrationError, CalibrationLine,
    CalibrationOutcome, CalibrationWorkflow, Point2, Point3, WorkflowConfig, WorkflowState,
};
pub use dialog::{
    dialog_channel, DialogError, DialogHandle, DialogRequest, InputDialog, InputPrompt,
};
pub use settings::AppSettings;
pub use store::{
    CalibrationStore, CalibrationTable, DegradeReason, FileBackend, KeyValueBackend,
    MemoryBackend, StorageError, StoreOutcome, CALIBRATION_SCALE_KEY,
};
pub use viewport::{
    CalibrationType, RecordingSurface, RenderingEngineId, RescaleInstruction, SpacingCalibration,
    ViewingSurface,
};
