//! Spacing calibration against a user-measured reference line.

mod annotation;
mod geometry;
mod workflow;

pub use annotation::{AnnotationMetadata, CalibrationLine, LineData, LineHandles};
pub use geometry::{distance2, distance3, round2, Point2, Point3};
pub use workflow::{
    parse_length, AppliedCalibration, CalibrationError, CalibrationOutcome, CalibrationWorkflow,
    WorkflowConfig, WorkflowState,
};
