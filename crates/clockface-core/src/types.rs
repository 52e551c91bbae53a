use crate::descriptor::Descriptor;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of points in the facial landmark layout.
pub const LANDMARK_COUNT: usize = 68;

// 68-point layout, image coordinates. "Left" is the subject's feature that
// appears on the image's left side.
const LEFT_EYE: std::ops::Range<usize> = 36..42;
const RIGHT_EYE: std::ops::Range<usize> = 42..48;
const NOSE_TIP: usize = 30;
const MOUTH_LEFT_CORNER: usize = 48;
const MOUTH_RIGHT_CORNER: usize = 54;
const INNER_LIP_TOP: usize = 62;
const INNER_LIP_BOTTOM: usize = 66;

#[derive(Error, Debug)]
pub enum LandmarkError {
    #[error("expected {LANDMARK_COUNT} landmarks, got {0}")]
    InvalidCount(usize),
    #[error("landmark {0} has a non-finite coordinate")]
    NonFinite(usize),
}

/// A 2-D image point in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f32 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    /// Arithmetic mean of a non-empty point set.
    pub fn centroid(points: &[Point]) -> Point {
        let n = points.len().max(1) as f32;
        let (sx, sy) = points
            .iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Point::new(sx / n, sy / n)
    }
}

/// Exactly [`LANDMARK_COUNT`] ordered facial landmarks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Point>", into = "Vec<Point>")]
pub struct Landmarks(Vec<Point>);

impl Landmarks {
    pub fn new(points: Vec<Point>) -> Result<Self, LandmarkError> {
        if points.len() != LANDMARK_COUNT {
            return Err(LandmarkError::InvalidCount(points.len()));
        }
        if let Some(idx) = points
            .iter()
            .position(|p| !p.x.is_finite() || !p.y.is_finite())
        {
            return Err(LandmarkError::NonFinite(idx));
        }
        Ok(Self(points))
    }

    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Six eye-contour points: corners at 0 and 3, vertical pairs (1, 5) and (2, 4).
    pub fn left_eye(&self) -> &[Point] {
        &self.0[LEFT_EYE]
    }

    pub fn right_eye(&self) -> &[Point] {
        &self.0[RIGHT_EYE]
    }

    pub fn nose_tip(&self) -> Point {
        self.0[NOSE_TIP]
    }

    /// Outer mouth corners (left, right).
    pub fn mouth_corners(&self) -> (Point, Point) {
        (self.0[MOUTH_LEFT_CORNER], self.0[MOUTH_RIGHT_CORNER])
    }

    /// Inner-lip midpoints (top, bottom).
    pub fn inner_lips(&self) -> (Point, Point) {
        (self.0[INNER_LIP_TOP], self.0[INNER_LIP_BOTTOM])
    }
}

impl TryFrom<Vec<Point>> for Landmarks {
    type Error = LandmarkError;

    fn try_from(points: Vec<Point>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Landmarks> for Vec<Point> {
    fn from(landmarks: Landmarks) -> Self {
        landmarks.0
    }
}

/// Bounding box for a detected face, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Finite coordinates and non-negative finite extents.
    pub fn is_well_formed(&self) -> bool {
        [self.x, self.y, self.width, self.height]
            .iter()
            .all(|v| v.is_finite())
            && self.width >= 0.0
            && self.height >= 0.0
    }
}

/// One face found by the external detector in a single frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "box")]
    pub bbox: BoundingBox,
    /// Detector score in [0, 1].
    pub confidence: f32,
    pub landmarks: Landmarks,
    pub descriptor: Descriptor,
}

/// An employee's enrolled face.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrolledFace {
    pub employee_id: String,
    pub descriptor: Descriptor,
}

/// Best roster match for a probe descriptor.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub employee_id: String,
    /// Euclidean distance to the matched descriptor.
    pub distance: f32,
    /// Match confidence in [0, 1], halved when ambiguous.
    pub confidence: f32,
    /// A second roster entry was within the ambiguity margin of the best.
    pub ambiguous: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Vec<Point> {
        (0..LANDMARK_COUNT)
            .map(|i| Point::new(i as f32, (i * 2) as f32))
            .collect()
    }

    #[test]
    fn test_landmarks_require_68_points() {
        let err = Landmarks::new(vec![Point::default(); 5]).unwrap_err();
        assert!(matches!(err, LandmarkError::InvalidCount(5)));
    }

    #[test]
    fn test_landmarks_reject_nan() {
        let mut points = grid();
        points[12].y = f32::NAN;
        let err = Landmarks::new(points).unwrap_err();
        assert!(matches!(err, LandmarkError::NonFinite(12)));
    }

    #[test]
    fn test_landmark_groups() {
        let lm = Landmarks::new(grid()).unwrap();
        assert_eq!(lm.left_eye().len(), 6);
        assert_eq!(lm.left_eye()[0], Point::new(36.0, 72.0));
        assert_eq!(lm.right_eye()[5], Point::new(47.0, 94.0));
        assert_eq!(lm.nose_tip(), Point::new(30.0, 60.0));
        assert_eq!(lm.mouth_corners().1, Point::new(54.0, 108.0));
        assert_eq!(lm.inner_lips().0, Point::new(62.0, 124.0));
    }

    #[test]
    fn test_centroid() {
        let c = Point::centroid(&[Point::new(0.0, 0.0), Point::new(4.0, 2.0)]);
        assert_eq!(c, Point::new(2.0, 1.0));
    }

    #[test]
    fn test_bbox_area() {
        let b = BoundingBox { x: 10.0, y: 10.0, width: 100.0, height: 120.0 };
        assert!((b.area() - 12_000.0).abs() < 1e-3);
    }

    #[test]
    fn test_landmarks_deserialize_checks_count() {
        let json = r#"[{"x": 1.0, "y": 2.0}]"#;
        let err = serde_json::from_str::<Landmarks>(json).unwrap_err();
        assert!(err.to_string().contains("expected 68 landmarks"));
    }

    #[test]
    fn test_bbox_well_formed() {
        let b = BoundingBox { x: 10.0, y: 20.0, width: 200.0, height: 250.0 };
        assert!(b.is_well_formed());
        assert!(BoundingBox { width: 0.0, ..b }.is_well_formed());
        assert!(!BoundingBox { width: -200.0, height: -250.0, ..b }.is_well_formed());
        assert!(!BoundingBox { height: f32::NAN, ..b }.is_well_formed());
        assert!(!BoundingBox { x: f32::INFINITY, ..b }.is_well_formed());
    }
}
