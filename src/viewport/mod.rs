//! Viewing surfaces the calibration is applied to.

mod surface;

pub use surface::{
    CalibrationType, RecordingSurface, RenderingEngineId, RescaleInstruction, SpacingCalibration,
    ViewingSurface,
};
