//! Calibration of image spacing against a user-measured reference line.
//!
//! The workflow measures the drawn line in world coordinates, asks the user for
//! its true physical length, stores the resulting scale factor for the image
//! and tells the viewing surface to rescale.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use thiserror::Error;

use super::annotation::CalibrationLine;
use super::geometry::{distance3, round2};
use crate::config::{distance_placeholder, get_messages};
use crate::dialog::{InputDialog, InputPrompt};
use crate::store::{CalibrationStore, StoreOutcome};
use crate::viewport::{RescaleInstruction, ViewingSurface};

/// Leading decimal number, optionally signed, with an optional exponent.
static LENGTH_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([+-]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][+-]?\d+)?)")
        .expect("valid length pattern")
});

/// Calibration workflow errors.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    #[error("Input dialog service is not initiated")]
    MissingDependency,
    #[error("Reference line is too short to calibrate against (length {0})")]
    DegenerateInput(f64),
    #[error("Invalid physical length: {0:?}")]
    InvalidLength(String),
    #[error("Calibration already finished: {0:?}")]
    AlreadyFinished(WorkflowState),
}

/// Workflow lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowState {
    #[default]
    AwaitingInput,
    Completed,
    Cancelled,
}

/// Configuration for the calibration workflow.
#[derive(Debug, Clone)]
pub struct WorkflowConfig {
    /// Dialog title
    pub title: String,
    /// Dialog placeholder
    pub placeholder: String,
    /// Reject reference lines whose rounded length is not above `min_reference_length`.
    /// Off by default: a zero-length line then yields a non-finite scale factor
    /// that is applied to the viewport but never stored.
    pub reject_degenerate_lines: bool,
    /// Shortest accepted reference length, in physical units
    pub min_reference_length: f64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self::localized("en", "mm")
    }
}

impl WorkflowConfig {
    /// Dialog texts in `lang`, naming `unit` in the placeholder.
    pub fn localized(lang: &str, unit: &str) -> Self {
        Self {
            title: get_messages(lang).calibration_title.to_string(),
            placeholder: distance_placeholder(lang, unit),
            reject_degenerate_lines: false,
            min_reference_length: 0.0,
        }
    }

    pub fn with_reject_degenerate_lines(mut self, reject: bool) -> Self {
        self.reject_degenerate_lines = reject;
        self
    }

    pub fn with_min_reference_length(mut self, length: f64) -> Self {
        self.min_reference_length = length;
        self
    }
}

/// Calibration that was persisted (or attempted) and applied.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedCalibration {
    pub image_id: String,
    /// Measured line length, rounded to 2 decimals
    pub reference_length: f64,
    /// Length entered by the user
    pub new_length: f64,
    /// `new_length / reference_length`
    pub scale_factor: f64,
    /// Whether the scale factor reached durable storage
    pub persisted: StoreOutcome<()>,
    /// Instruction sent to the viewing surface
    pub instruction: RescaleInstruction,
}

/// How a calibration run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum CalibrationOutcome {
    Applied(AppliedCalibration),
    Cancelled,
}

/// Parse the leading number of user-entered text, e.g. `"120 mm"` -> `120.0`.
pub fn parse_length(input: &str) -> Option<f64> {
    LENGTH_PATTERN
        .captures(input)
        .and_then(|captures| captures.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// One calibration run for a drawn calibration line.
pub struct CalibrationWorkflow {
    config: WorkflowConfig,
    store: Arc<CalibrationStore>,
    dialog: Option<Arc<dyn InputDialog>>,
    state: WorkflowState,
}

impl CalibrationWorkflow {
    /// Create a workflow.
    ///
    /// # Arguments
    /// * `config` - Dialog texts and degenerate-line policy.
    /// * `store` - Where the scale factor is persisted.
    /// * `dialog` - Input dialog service; `None` if the host has not wired one up.
    pub fn new(
        config: WorkflowConfig,
        store: Arc<CalibrationStore>,
        dialog: Option<Arc<dyn InputDialog>>,
    ) -> Self {
        Self {
            config,
            store,
            dialog,
            state: WorkflowState::AwaitingInput,
        }
    }

    pub fn state(&self) -> WorkflowState {
        self.state
    }

    pub fn config(&self) -> &WorkflowConfig {
        &self.config
    }

    /// Complete the calibration for `line`, shown on `viewport`.
    ///
    /// Waits for the dialog answer. A cancelled dialog ends the run with
    /// [`CalibrationOutcome::Cancelled`] and no side effects. On a submitted
    /// length the scale factor is saved first, then the viewport is rescaled by
    /// its inverse; a failed save does not stop the rescale.
    pub async fn complete_calibration(
        &mut self,
        line: &CalibrationLine,
        viewport: &dyn ViewingSurface,
    ) -> Result<CalibrationOutcome, CalibrationError> {
        if self.state != WorkflowState::AwaitingInput {
            return Err(CalibrationError::AlreadyFinished(self.state));
        }

        let image_id = line.image_id();
        let (start, end) = line.points();
        let reference_length = round2(distance3(start, end));

        let dialog = self
            .dialog
            .as_ref()
            .ok_or(CalibrationError::MissingDependency)?;

        let degenerate =
            !reference_length.is_finite() || reference_length <= self.config.min_reference_length;
        if degenerate {
            if self.config.reject_degenerate_lines {
                tracing::warn!(
                    "Rejecting calibration line of length {} on image {}",
                    reference_length,
                    image_id
                );
                return Err(CalibrationError::DegenerateInput(reference_length));
            }
            tracing::warn!(
                "Calibrating image {} against a degenerate line of length {}",
                image_id,
                reference_length
            );
        }

        let prompt = InputPrompt {
            title: self.config.title.clone(),
            placeholder: self.config.placeholder.clone(),
            default_value: reference_length.to_string(),
        };

        let pending = match dialog.request_input(prompt) {
            Ok(pending) => pending,
            Err(e) => {
                tracing::warn!("Calibration dialog unavailable: {}", e);
                return Err(CalibrationError::MissingDependency);
            }
        };

        let entered = match pending.await {
            Ok(entered) => entered,
            Err(_) => {
                tracing::info!("Calibration cancelled for image {}", image_id);
                self.state = WorkflowState::Cancelled;
                return Ok(CalibrationOutcome::Cancelled);
            }
        };

        let new_length = match parse_length(&entered) {
            Some(length) if length.is_finite() && length > 0.0 => length,
            _ => return Err(CalibrationError::InvalidLength(entered)),
        };

        let scale_factor = new_length / reference_length;
        tracing::info!(
            "Calibration: original length {}, new length {}, scale {}",
            reference_length,
            new_length,
            scale_factor
        );

        let persisted = self.store.save(image_id, scale_factor);
        if let Some(reason) = persisted.reason() {
            tracing::warn!("Calibration for image {} not persisted: {}", image_id, reason);
        }

        let instruction =
            RescaleInstruction::user(image_id, viewport.rendering_engine(), 1.0 / scale_factor);
        viewport.apply_rescale(&instruction);

        self.state = WorkflowState::Completed;

        Ok(CalibrationOutcome::Applied(AppliedCalibration {
            image_id: image_id.to_string(),
            reference_length,
            new_length,
            scale_factor,
            persisted,
            instruction,
        }))
    }
}
