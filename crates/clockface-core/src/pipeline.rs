//! Per-frame orchestration: gates → matcher → confirmation → outcome.
//!
//! [`FramePipeline`] is the synchronous heart of a capture session. It owns
//! the session's [`ConfirmationTracker`] and turns one optional detection
//! into exactly one [`FrameOutcome`] for the UI. Scheduling, cancellation and
//! the detector call itself live in the session layer.

use crate::confirmation::ConfirmationTracker;
use crate::descriptor::Descriptor;
use crate::matcher::{EuclideanMatcher, Matcher};
use crate::scoring::{self, FaceAssessment};
use crate::thresholds::Thresholds;
use crate::types::{Detection, EnrolledFace};
use serde::{Deserialize, Serialize};

/// Why a frame did not count toward a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rejection {
    NoFace,
    LowConfidence,
    TooSmall,
    PoorQuality,
    LowLiveness,
    /// Passed every gate but no roster entry was within the match threshold.
    NotRecognized,
    /// Enrollment only: the face already belongs to another employee.
    AlreadyRegistered,
}

impl Rejection {
    /// User-facing guidance for this rejection.
    pub fn message(self) -> &'static str {
        match self {
            Rejection::NoFace => "No face detected. Please position your face in the frame.",
            Rejection::LowConfidence => "Face unclear. Please ensure good lighting.",
            Rejection::TooSmall => "Please move closer to the camera.",
            Rejection::PoorQuality => "Please face the camera directly.",
            Rejection::LowLiveness => "Please keep your eyes open and look at the camera.",
            Rejection::NotRecognized => "Face not recognized.",
            Rejection::AlreadyRegistered => "This face is already registered to another employee.",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FrameStatus {
    Rejected,
    Progressing,
    Confirmed,
}

/// What one frame produced, for the UI layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutcome {
    pub status: FrameStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub streak: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejection: Option<Rejection>,
    /// Match confidence of this frame, when it matched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    /// Enrollment only: the descriptor captured on confirmation.
    #[serde(skip)]
    pub descriptor: Option<Descriptor>,
}

impl FrameOutcome {
    pub fn rejected(rejection: Rejection) -> Self {
        Self {
            status: FrameStatus::Rejected,
            message: rejection.message().to_string(),
            employee_id: None,
            streak: None,
            rejection: Some(rejection),
            confidence: None,
            descriptor: None,
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.status == FrameStatus::Confirmed
    }
}

/// What a session is trying to establish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaptureMode {
    /// Identify who is in front of the camera (clock-in / clock-out).
    Verify,
    /// Capture a descriptor for `employee_id`.
    Enroll { employee_id: String },
}

/// Apply the rejection gates in order, short-circuiting on the first failure.
pub fn screen(
    detection: Option<&Detection>,
    thresholds: &Thresholds,
) -> Result<FaceAssessment, Rejection> {
    let detection = detection.ok_or(Rejection::NoFace)?;
    if below(detection.confidence, thresholds.min_detection_confidence) {
        return Err(Rejection::LowConfidence);
    }
    if !detection.bbox.is_well_formed() || below(detection.bbox.area(), thresholds.min_face_area) {
        return Err(Rejection::TooSmall);
    }
    let assessment = scoring::assess(detection, thresholds);
    if below(assessment.quality, thresholds.min_quality) {
        return Err(Rejection::PoorQuality);
    }
    if below(assessment.liveness, thresholds.min_liveness) {
        return Err(Rejection::LowLiveness);
    }
    Ok(assessment)
}

/// Gate comparison; NaN never passes.
fn below(value: f32, min: f32) -> bool {
    value.is_nan() || value < min
}

/// Synchronous per-frame pipeline owning one session's confirmation state.
#[derive(Debug, Clone)]
pub struct FramePipeline {
    mode: CaptureMode,
    thresholds: Thresholds,
    matcher: EuclideanMatcher,
    tracker: ConfirmationTracker,
    confirmed: Option<FrameOutcome>,
}

impl FramePipeline {
    pub fn new(mode: CaptureMode, thresholds: Thresholds, required_matches: u32) -> Self {
        Self {
            mode,
            matcher: EuclideanMatcher::from(&thresholds),
            thresholds,
            tracker: ConfirmationTracker::new(required_matches),
            confirmed: None,
        }
    }

    pub fn mode(&self) -> &CaptureMode {
        &self.mode
    }

    pub fn tracker(&self) -> &ConfirmationTracker {
        &self.tracker
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.is_some()
    }

    /// Abort the current streak (and any confirmation) without ending the session.
    pub fn reset(&mut self) {
        self.tracker.reset();
        self.confirmed = None;
    }

    /// Process one frame's detection against `roster`.
    ///
    /// Once a frame has confirmed, later calls return that confirmation
    /// unchanged until [`reset`](Self::reset).
    pub fn process(&mut self, detection: Option<&Detection>, roster: &[EnrolledFace]) -> FrameOutcome {
        if let Some(done) = &self.confirmed {
            return done.clone();
        }

        let Some(detection) = detection else {
            return reject(&mut self.tracker, Rejection::NoFace);
        };
        let assessment = match screen(Some(detection), &self.thresholds) {
            Ok(a) => a,
            Err(rejection) => return reject(&mut self.tracker, rejection),
        };
        tracing::trace!(
            quality = assessment.quality,
            liveness = assessment.liveness,
            "frame passed gates"
        );

        let matched = self.matcher.best_match(&detection.descriptor, roster);

        let outcome = match &self.mode {
            CaptureMode::Verify => {
                let Some(m) = matched else {
                    return reject(&mut self.tracker, Rejection::NotRecognized);
                };
                let c = self.tracker.add_match(Some(&m.employee_id));
                if c.confirmed {
                    FrameOutcome {
                        status: FrameStatus::Confirmed,
                        message: "Identity confirmed.".to_string(),
                        employee_id: Some(m.employee_id),
                        streak: Some(c.streak),
                        rejection: None,
                        confidence: Some(m.confidence),
                        descriptor: None,
                    }
                } else {
                    FrameOutcome {
                        status: FrameStatus::Progressing,
                        message: format!(
                            "Verifying identity... ({}/{})",
                            c.streak,
                            self.tracker.required()
                        ),
                        employee_id: None,
                        streak: Some(c.streak),
                        rejection: None,
                        confidence: Some(m.confidence),
                        descriptor: None,
                    }
                }
            }
            CaptureMode::Enroll { employee_id } => {
                if let Some(m) = matched.filter(|m| &m.employee_id != employee_id) {
                    tracing::warn!(
                        enrolling = %employee_id,
                        distance = m.distance,
                        "enrollment face matches another employee"
                    );
                    return reject(&mut self.tracker, Rejection::AlreadyRegistered);
                }
                let c = self.tracker.add_match(Some(employee_id));
                if c.confirmed {
                    FrameOutcome {
                        status: FrameStatus::Confirmed,
                        message: "Face captured.".to_string(),
                        employee_id: Some(employee_id.clone()),
                        streak: Some(c.streak),
                        rejection: None,
                        confidence: None,
                        descriptor: Some(detection.descriptor.clone()),
                    }
                } else {
                    FrameOutcome {
                        status: FrameStatus::Progressing,
                        message: format!(
                            "Capturing face... ({}/{})",
                            c.streak,
                            self.tracker.required()
                        ),
                        employee_id: None,
                        streak: Some(c.streak),
                        rejection: None,
                        confidence: None,
                        descriptor: None,
                    }
                }
            }
        };

        if outcome.is_confirmed() {
            tracing::info!(
                employee_id = outcome.employee_id.as_deref().unwrap_or_default(),
                streak = outcome.streak.unwrap_or_default(),
                "identity confirmed"
            );
            self.confirmed = Some(outcome.clone());
        }
        outcome
    }

}

/// Record a no-match event for a rejected frame.
fn reject(tracker: &mut ConfirmationTracker, rejection: Rejection) -> FrameOutcome {
    tracing::debug!(?rejection, "frame rejected");
    tracker.add_match(None);
    FrameOutcome::rejected(rejection)
}
