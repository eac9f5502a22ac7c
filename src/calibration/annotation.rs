//! Calibration line payload produced by the annotation tool.

use serde::{Deserialize, Serialize};

use super::geometry::Point3;

/// Metadata attached to an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationMetadata {
    /// Image the line was drawn on.
    pub referenced_image_id: String,
}

/// Endpoint handles of the line, in world coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineHandles {
    pub points: [Point3; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    pub handles: LineHandles,
}

/// A completed calibration line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CalibrationLine {
    pub metadata: AnnotationMetadata,
    pub data: LineData,
}

impl CalibrationLine {
    pub fn new(image_id: impl Into<String>, start: Point3, end: Point3) -> Self {
        Self {
            metadata: AnnotationMetadata {
                referenced_image_id: image_id.into(),
            },
            data: LineData {
                handles: LineHandles {
                    points: [start, end],
                },
            },
        }
    }

    /// Parse the annotation tool's JSON payload.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn image_id(&self) -> &str {
        &self.metadata.referenced_image_id
    }

    pub fn points(&self) -> (Point3, Point3) {
        let [start, end] = self.data.handles.points;
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_annotation_payload() {
        let json = r#"{
            "metadata": { "referencedImageId": "wadors:study/1/series/2/instance/3" },
            "data": { "handles": { "points": [[0, 0, 0], [3, 4, 0]] } }
        }"#;

        let line = CalibrationLine::from_json(json).unwrap();
        assert_eq!(line.image_id(), "wadors:study/1/series/2/instance/3");
        assert_eq!(line.points(), ([0.0, 0.0, 0.0], [3.0, 4.0, 0.0]));
    }

    #[test]
    fn test_payload_needs_two_points() {
        let json = r#"{
            "metadata": { "referencedImageId": "img" },
            "data": { "handles": { "points": [[0, 0, 0]] } }
        }"#;
        assert!(CalibrationLine::from_json(json).is_err());
    }

    #[test]
    fn test_new_matches_parsed() {
        let built = CalibrationLine::new("img", [1.0, 2.0, 3.0], [4.0, 5.0, 6.0]);
        let json = serde_json::to_string(&built).unwrap();
        assert!(json.contains("referencedImageId"));
        assert_eq!(CalibrationLine::from_json(&json).unwrap(), built);
    }
}
