//! Distance helpers for calibration lines.

/// A point in canvas space.
pub type Point2 = [f64; 2];

/// A point in world (physical) space.
pub type Point3 = [f64; 3];

/// Euclidean distance between two 2D points.
pub fn distance2(a: Point2, b: Point2) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    (dx * dx + dy * dy).sqrt()
}

/// Euclidean distance between two 3D points.
///
/// Calibration lengths are measured with this in world coordinates, never in
/// canvas pixels.
pub fn distance3(a: Point3, b: Point3) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    (dx * dx + dy * dy + dz * dz).sqrt()
}

/// Round to 2 decimal places.
///
/// Shared by the displayed reference length and the persisted scale factors.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
