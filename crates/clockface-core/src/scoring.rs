//! Single-frame quality and liveness heuristics.
//!
//! Both scores start from the detector confidence and apply multiplicative
//! penalties derived from the 68-point landmark geometry. Quality rewards a
//! large, level, frontal face; liveness rewards open, symmetric eyes and a
//! closed mouth. Neither needs more than one frame or any extra inference.

use crate::thresholds::Thresholds;
use crate::types::{Detection, Point};
use serde::Serialize;

// --- Quality penalties ---
const MAX_TILT_RAD: f32 = 0.2;
const TILT_PENALTY: f32 = 0.7;
const MAX_YAW_RATIO: f32 = 0.3;
const YAW_PENALTY: f32 = 0.6;

// --- Liveness penalties ---
const SMALL_FACE_PENALTY: f32 = 0.5;
const CLOSED_EYE_OPENNESS: f32 = 0.2;
const CLOSED_EYE_PENALTY: f32 = 0.5;
const NARROW_EYE_OPENNESS: f32 = 0.25;
const NARROW_EYE_PENALTY: f32 = 0.7;
const MIN_EYE_SYMMETRY: f32 = 0.5;
const ASYMMETRY_PENALTY: f32 = 0.8;
const MAX_MOUTH_OPENNESS: f32 = 0.5;
const OPEN_MOUTH_PENALTY: f32 = 0.8;

/// Landmark-derived measurements for one face.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceGeometry {
    /// Bounding-box area in px².
    pub area: f32,
    /// Angle of the eye line in radians (0 = level).
    pub tilt: f32,
    /// Horizontal nose-tip offset from the eye midpoint over inter-eye distance.
    pub yaw_ratio: f32,
    pub left_eye_openness: f32,
    pub right_eye_openness: f32,
    /// min/max of the two eye openness values.
    pub eye_symmetry: f32,
    pub mouth_openness: f32,
}

/// Scores for one detection.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FaceAssessment {
    pub confidence: f32,
    pub geometry: FaceGeometry,
    pub quality: f32,
    pub liveness: f32,
}

/// Measure pose, eye and mouth geometry from a detection's landmarks.
pub fn measure(detection: &Detection) -> FaceGeometry {
    let lm = &detection.landmarks;
    let left = Point::centroid(lm.left_eye());
    let right = Point::centroid(lm.right_eye());

    let tilt = (right.y - left.y).atan2(right.x - left.x);

    let eye_mid = Point::new((left.x + right.x) / 2.0, (left.y + right.y) / 2.0);
    let inter_eye = left.distance(&right);
    let yaw_ratio = if inter_eye > 0.0 {
        (lm.nose_tip().x - eye_mid.x).abs() / inter_eye
    } else {
        // Collapsed eye line: treat as fully turned.
        f32::INFINITY
    };

    let left_eye_openness = eye_openness(lm.left_eye());
    let right_eye_openness = eye_openness(lm.right_eye());
    let widest = left_eye_openness.max(right_eye_openness);
    let eye_symmetry = if widest > 0.0 {
        left_eye_openness.min(right_eye_openness) / widest
    } else {
        1.0
    };

    let (corner_l, corner_r) = lm.mouth_corners();
    let (lip_top, lip_bottom) = lm.inner_lips();
    let mouth_width = corner_l.distance(&corner_r);
    let mouth_openness = if mouth_width > 0.0 {
        lip_top.distance(&lip_bottom) / mouth_width
    } else {
        0.0
    };

    FaceGeometry {
        area: detection.bbox.area(),
        tilt,
        yaw_ratio,
        left_eye_openness,
        right_eye_openness,
        eye_symmetry,
        mouth_openness,
    }
}

/// Eye aspect ratio: mean vertical extent over horizontal extent.
fn eye_openness(eye: &[Point]) -> f32 {
    let horizontal = eye[0].distance(&eye[3]);
    if horizontal <= 0.0 {
        return 0.0;
    }
    let vertical = (eye[1].distance(&eye[5]) + eye[2].distance(&eye[4])) / 2.0;
    vertical / horizontal
}

/// Pose, centering and size quality in [0, 1].
pub fn quality_score(confidence: f32, geometry: &FaceGeometry, thresholds: &Thresholds) -> f32 {
    let mut score = confidence;

    let size_ratio = (geometry.area / thresholds.ideal_face_area).min(1.0);
    score *= 0.5 + 0.5 * size_ratio;

    if geometry.tilt.abs() > MAX_TILT_RAD {
        score *= TILT_PENALTY;
    }
    if geometry.yaw_ratio > MAX_YAW_RATIO {
        score *= YAW_PENALTY;
    }

    score.min(1.0)
}

/// Eyes-open, mouth-closed liveness estimate in [0, 1].
pub fn liveness_score(confidence: f32, geometry: &FaceGeometry, thresholds: &Thresholds) -> f32 {
    let mut score = confidence;

    if geometry.area < thresholds.min_face_area {
        score *= SMALL_FACE_PENALTY;
    }

    let least_open = geometry.left_eye_openness.min(geometry.right_eye_openness);
    if least_open < CLOSED_EYE_OPENNESS {
        score *= CLOSED_EYE_PENALTY;
    } else if least_open < NARROW_EYE_OPENNESS {
        score *= NARROW_EYE_PENALTY;
    }

    if geometry.eye_symmetry < MIN_EYE_SYMMETRY {
        score *= ASYMMETRY_PENALTY;
    }
    if geometry.mouth_openness > MAX_MOUTH_OPENNESS {
        score *= OPEN_MOUTH_PENALTY;
    }

    score.min(1.0)
}

/// Measure and score a detection.
pub fn assess(detection: &Detection, thresholds: &Thresholds) -> FaceAssessment {
    let geometry = measure(detection);
    FaceAssessment {
        confidence: detection.confidence,
        geometry,
        quality: quality_score(detection.confidence, &geometry, thresholds),
        liveness: liveness_score(detection.confidence, &geometry, thresholds),
    }
}
