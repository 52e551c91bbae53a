use serde::{Deserialize, Serialize};

/// Gate and matching thresholds shared by the scorer, matcher and pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    /// Detector score below which a face is "unclear".
    pub min_detection_confidence: f32,
    /// Bounding-box area (px²) below which the subject must move closer.
    pub min_face_area: f32,
    /// Bounding-box area (px²) at which the quality size factor saturates.
    pub ideal_face_area: f32,
    pub min_quality: f32,
    pub min_liveness: f32,
    /// Exclusive upper bound on descriptor distance for a match.
    pub match_threshold: f32,
    /// Best and second-best closer than this halve the match confidence.
    pub ambiguity_margin: f32,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_detection_confidence: 0.5,
            min_face_area: 10_000.0,
            ideal_face_area: 40_000.0,
            min_quality: 0.5,
            min_liveness: 0.4,
            match_threshold: 0.55,
            ambiguity_margin: 0.1,
        }
    }
}
