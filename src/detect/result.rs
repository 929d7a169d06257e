use serde::{Deserialize, Serialize};

/// Detection service response.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
pub struct DetectionResult {
    /// Service-reported failure code. Absent or 0 means success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<i64>,
    /// Bounding boxes in response order.
    #[serde(default)]
    pub detections: Vec<Detection>,
}

impl DetectionResult {
    /// True when the service flagged the result as failed.
    pub fn is_error(&self) -> bool {
        matches!(self.error_code, Some(code) if code != 0)
    }
}

/// One bounding box. Coordinates are relative to the frame (0.0..=1.0) with
/// `x`/`y` at the top-left corner. Extra fields sent by the service are
/// ignored.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Detection {
    pub class: i64,
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub confidence: f32,
}

impl Detection {
    /// Text drawn next to the box.
    pub fn label(&self) -> String {
        self.class.to_string()
    }
}
