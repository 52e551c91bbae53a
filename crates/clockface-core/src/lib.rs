//! clockface-core: Face quality scoring, descriptor matching and
//! consecutive-match identity confirmation.
//!
//! Everything here is synchronous and side-effect free apart from the
//! per-session state held by [`FramePipeline`]. The face detector, camera and
//! persistence are external; see `clockface-session` for the polling loop.

pub mod confirmation;
pub mod descriptor;
pub mod matcher;
pub mod pipeline;
pub mod scoring;
pub mod thresholds;
pub mod types;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use confirmation::{Confirmation, ConfirmationTracker, StreakState};
pub use descriptor::{Descriptor, DescriptorError, DESCRIPTOR_DIM};
pub use matcher::{EuclideanMatcher, Matcher};
pub use pipeline::{screen, CaptureMode, FrameOutcome, FramePipeline, FrameStatus, Rejection};
pub use scoring::{FaceAssessment, FaceGeometry};
pub use thresholds::Thresholds;
pub use types::{BoundingBox, Detection, EnrolledFace, Landmarks, LandmarkError, MatchResult, Point};
