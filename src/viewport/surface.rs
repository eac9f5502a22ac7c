//! Viewing-surface capability receiving rescale instructions.

use std::sync::Mutex;

use serde::Serialize;

/// Origin of a spacing calibration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CalibrationType {
    /// Entered by the user against a calibration line.
    User,
}

/// Spacing correction handed to the rendering engine.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SpacingCalibration {
    #[serde(rename = "type")]
    pub kind: CalibrationType,
    /// Multiplier applied to the current pixel spacing.
    pub scale: f64,
}

/// Opaque handle of the rendering engine that owns a viewport.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct RenderingEngineId(pub String);

impl RenderingEngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }
}

/// Instruction to recompute the pixel-to-physical mapping of one image.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RescaleInstruction {
    pub image_id: String,
    pub rendering_engine: RenderingEngineId,
    pub calibration: SpacingCalibration,
}

impl RescaleInstruction {
    /// User-originated rescale of `image_id` by `scale`.
    pub fn user(
        image_id: impl Into<String>,
        rendering_engine: RenderingEngineId,
        scale: f64,
    ) -> Self {
        Self {
            image_id: image_id.into(),
            rendering_engine,
            calibration: SpacingCalibration {
                kind: CalibrationType::User,
                scale,
            },
        }
    }
}

/// The viewport displaying the calibrated image.
pub trait ViewingSurface: Send + Sync {
    /// Rendering engine that draws this surface.
    fn rendering_engine(&self) -> RenderingEngineId;

    /// Apply a rescale instruction.
    fn apply_rescale(&self, instruction: &RescaleInstruction);
}

/// Surface that keeps every instruction it receives.
#[derive(Debug)]
pub struct RecordingSurface {
    engine: RenderingEngineId,
    received: Mutex<Vec<RescaleInstruction>>,
}

impl RecordingSurface {
    pub fn new(engine: RenderingEngineId) -> Self {
        Self {
            engine,
            received: Mutex::new(Vec::new()),
        }
    }

    /// Instructions received so far, oldest first.
    pub fn received(&self) -> Vec<RescaleInstruction> {
        self.received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl ViewingSurface for RecordingSurface {
    fn rendering_engine(&self) -> RenderingEngineId {
        self.engine.clone()
    }

    fn apply_rescale(&self, instruction: &RescaleInstruction) {
        self.received
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(instruction.clone());
    }
}
