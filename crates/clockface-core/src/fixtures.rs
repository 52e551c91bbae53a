//! Synthetic detections with controllable geometry, for tests.

use crate::descriptor::{Descriptor, DESCRIPTOR_DIM};
use crate::types::{BoundingBox, Detection, Landmarks, Point, LANDMARK_COUNT};

/// Geometry of a synthetic face.
#[derive(Debug, Clone, Copy)]
pub struct FaceShape {
    /// Left eye centre.
    pub origin: Point,
    pub eye_distance: f32,
    /// Eye-line angle in radians.
    pub tilt: f32,
    /// Nose-tip horizontal offset as a fraction of eye distance.
    pub yaw_ratio: f32,
    /// Eye aspect ratio (left, right).
    pub eye_openness: (f32, f32),
    pub mouth_openness: f32,
}

impl Default for FaceShape {
    fn default() -> Self {
        Self {
            origin: Point::new(280.0, 220.0),
            eye_distance: 80.0,
            tilt: 0.0,
            yaw_ratio: 0.0,
            eye_openness: (0.3, 0.3),
            mouth_openness: 0.2,
        }
    }
}

const EYE_HALF_WIDTH: f32 = 16.0;

fn eye(center: Point, openness: f32) -> [Point; 6] {
    let w = EYE_HALF_WIDTH;
    let h = openness * w;
    [
        Point::new(center.x - w, center.y),
        Point::new(center.x - w / 3.0, center.y - h),
        Point::new(center.x + w / 3.0, center.y - h),
        Point::new(center.x + w, center.y),
        Point::new(center.x + w / 3.0, center.y + h),
        Point::new(center.x - w / 3.0, center.y + h),
    ]
}

/// Build a 68-point layout realising `shape`.
pub fn landmarks(shape: &FaceShape) -> Landmarks {
    let left = shape.origin;
    let right = Point::new(
        left.x + shape.eye_distance * shape.tilt.cos(),
        left.y + shape.eye_distance * shape.tilt.sin(),
    );
    let mid = Point::new((left.x + right.x) / 2.0, (left.y + right.y) / 2.0);
    let span = shape.eye_distance.max(EYE_HALF_WIDTH * 4.0);

    let mut points = vec![mid; LANDMARK_COUNT];
    points[36..42].copy_from_slice(&eye(left, shape.eye_openness.0));
    points[42..48].copy_from_slice(&eye(right, shape.eye_openness.1));
    points[30] = Point::new(mid.x + shape.yaw_ratio * shape.eye_distance, mid.y + 0.6 * span);

    let mouth_center = Point::new(mid.x, mid.y + span);
    let half_width = 0.3 * span;
    let half_gap = shape.mouth_openness * half_width;
    points[48] = Point::new(mouth_center.x - half_width, mouth_center.y);
    points[54] = Point::new(mouth_center.x + half_width, mouth_center.y);
    points[62] = Point::new(mouth_center.x, mouth_center.y - half_gap);
    points[66] = Point::new(mouth_center.x, mouth_center.y + half_gap);

    Landmarks::new(points).expect("synthetic landmarks are well-formed")
}

/// A square-boxed detection of the given area around `shape`.
pub fn detection(confidence: f32, area: f32, shape: &FaceShape, descriptor: Descriptor) -> Detection {
    let side = area.max(0.0).sqrt();
    let center = Point::new(shape.origin.x + shape.eye_distance / 2.0, shape.origin.y + 30.0);
    Detection {
        bbox: BoundingBox {
            x: center.x - side / 2.0,
            y: center.y - side / 2.0,
            width: side,
            height: side,
        },
        confidence,
        landmarks: landmarks(shape),
        descriptor,
    }
}

/// A frontal, well-lit detection that clears every gate with default thresholds.
pub fn good_detection(descriptor: Descriptor) -> Detection {
    detection(0.9, 50_000.0, &FaceShape::default(), descriptor)
}

/// Descriptor with `first` in component 0 and zeros elsewhere, so the distance
/// between two of them is the difference of their first components.
pub fn descriptor(first: f32) -> Descriptor {
    let mut values = vec![0.0f32; DESCRIPTOR_DIM];
    values[0] = first;
    Descriptor::new(values).expect("synthetic descriptor is well-formed")
}
