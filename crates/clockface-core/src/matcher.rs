use crate::descriptor::Descriptor;
use crate::thresholds::Thresholds;
use crate::types::{EnrolledFace, MatchResult};

/// Strategy for comparing a probe descriptor against an enrolled roster.
pub trait Matcher {
    /// Best roster entry for `probe`, or `None` when nothing is close enough.
    fn best_match(&self, probe: &Descriptor, roster: &[EnrolledFace]) -> Option<MatchResult>;
}

/// Euclidean-distance matcher with an ambiguity penalty.
///
/// Only roster entries strictly closer than `threshold` are candidates. The
/// closest candidate wins (first in roster order on ties). If the runner-up
/// candidate is within `ambiguity_margin` of the winner, confidence is halved
/// but the winner is still returned. Every roster entry is compared; there is
/// no early exit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EuclideanMatcher {
    pub threshold: f32,
    pub ambiguity_margin: f32,
}

impl EuclideanMatcher {
    pub fn new(threshold: f32, ambiguity_margin: f32) -> Self {
        Self {
            threshold,
            ambiguity_margin,
        }
    }
}

impl Default for EuclideanMatcher {
    fn default() -> Self {
        Self::from(&Thresholds::default())
    }
}

impl From<&Thresholds> for EuclideanMatcher {
    fn from(t: &Thresholds) -> Self {
        Self::new(t.match_threshold, t.ambiguity_margin)
    }
}

impl Matcher for EuclideanMatcher {
    fn best_match(&self, probe: &Descriptor, roster: &[EnrolledFace]) -> Option<MatchResult> {
        let mut best: Option<(usize, f32)> = None;
        let mut second_best = f32::INFINITY;

        for (i, face) in roster.iter().enumerate() {
            let distance = probe.euclidean_distance(&face.descriptor);
            if distance >= self.threshold {
                continue;
            }
            match best {
                Some((_, best_distance)) if distance >= best_distance => {
                    second_best = second_best.min(distance);
                }
                _ => {
                    if let Some((_, previous)) = best {
                        second_best = previous;
                    }
                    best = Some((i, distance));
                }
            }
        }

        let (idx, distance) = best?;
        let mut confidence = ((self.threshold - distance) / self.threshold).max(0.0);
        let ambiguous = second_best - distance < self.ambiguity_margin;
        if ambiguous {
            confidence *= 0.5;
        }

        tracing::trace!(
            employee_id = %roster[idx].employee_id,
            distance,
            second_best,
            confidence,
            ambiguous,
            "roster match"
        );

        Some(MatchResult {
            employee_id: roster[idx].employee_id.clone(),
            distance,
            confidence,
            ambiguous,
        })
    }
}
