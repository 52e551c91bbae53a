//! Consecutive-match confirmation.
//!
//! A single in-threshold match can be a false positive, so an identity is
//! only confirmed after `required` consecutive frames matched the *same*
//! candidate. Any no-match frame or change of candidate restarts the run.
//! The confirmed identity is therefore always the candidate with the current
//! unbroken run, never the most frequent one overall.

use std::collections::VecDeque;

/// Streak state driven by one event per frame.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreakState {
    #[default]
    Empty,
    Streaking { candidate: String, count: u32 },
}

/// Result of feeding one frame's match event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub confirmed: bool,
    pub streak: u32,
    pub candidate: Option<String>,
}

/// Per-session confirmation state machine.
#[derive(Debug, Clone)]
pub struct ConfirmationTracker {
    required: u32,
    state: StreakState,
    /// Recent candidate ids, bounded to `required + 2`.
    history: VecDeque<String>,
}

impl ConfirmationTracker {
    /// `required` below 1 is raised to 1.
    pub fn new(required: u32) -> Self {
        let required = required.max(1);
        Self {
            required,
            state: StreakState::Empty,
            history: VecDeque::with_capacity(required as usize + 2),
        }
    }

    pub fn required(&self) -> u32 {
        self.required
    }

    pub fn state(&self) -> &StreakState {
        &self.state
    }

    pub fn streak(&self) -> u32 {
        match &self.state {
            StreakState::Empty => 0,
            StreakState::Streaking { count, .. } => *count,
        }
    }

    /// Recent candidate ids, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &str> {
        self.history.iter().map(String::as_str)
    }

    /// Feed one frame: `Some(id)` for a match, `None` for a rejected or
    /// unmatched frame.
    pub fn add_match(&mut self, candidate: Option<&str>) -> Confirmation {
        let Some(id) = candidate else {
            self.reset();
            return Confirmation {
                confirmed: false,
                streak: 0,
                candidate: None,
            };
        };

        let count = match &mut self.state {
            StreakState::Streaking { candidate, count } if candidate.as_str() == id => {
                *count = count.saturating_add(1);
                *count
            }
            _ => {
                self.history.clear();
                self.state = StreakState::Streaking {
                    candidate: id.to_string(),
                    count: 1,
                };
                1
            }
        };

        self.history.push_back(id.to_string());
        let cap = self.required as usize + 2;
        while self.history.len() > cap {
            self.history.pop_front();
        }

        let confirmed = count >= self.required;
        tracing::debug!(
            candidate = id,
            streak = count,
            required = self.required,
            confirmed,
            "match streak"
        );

        Confirmation {
            confirmed,
            streak: count,
            candidate: Some(id.to_string()),
        }
    }

    /// Drop the current streak.
    pub fn reset(&mut self) {
        self.state = StreakState::Empty;
        self.history.clear();
    }
}

impl Default for ConfirmationTracker {
    fn default() -> Self {
        Self::new(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_match_confirms_when_one_required() {
        let mut t = ConfirmationTracker::new(1);
        let c = t.add_match(Some("E1"));
        assert!(c.confirmed);
        assert_eq!(c.streak, 1);
        assert_eq!(c.candidate.as_deref(), Some("E1"));
    }

    #[test]
    fn test_candidate_change_restarts_streak() {
        let mut t = ConfirmationTracker::new(3);
        assert!(!t.add_match(Some("E1")).confirmed);
        assert_eq!(t.add_match(Some("E1")).streak, 2);

        let c = t.add_match(Some("E2"));
        assert!(!c.confirmed);
        assert_eq!(c.streak, 1);
        assert_eq!(
            t.state(),
            &StreakState::Streaking {
                candidate: "E2".into(),
                count: 1
            }
        );
    }

    #[test]
    fn test_no_match_resets() {
        let mut t = ConfirmationTracker::new(3);
        t.add_match(Some("E1"));
        t.add_match(Some("E1"));
        let c = t.add_match(None);
        assert!(!c.confirmed);
        assert_eq!(c.streak, 0);
        assert_eq!(t.state(), &StreakState::Empty);
        assert_eq!(t.history().count(), 0);

        // Run starts over after the gap.
        assert_eq!(t.add_match(Some("E1")).streak, 1);
    }

    #[test]
    fn test_confirms_on_required_run() {
        let mut t = ConfirmationTracker::new(3);
        assert!(!t.add_match(Some("E1")).confirmed);
        assert!(!t.add_match(Some("E1")).confirmed);
        let c = t.add_match(Some("E1"));
        assert!(c.confirmed);
        assert_eq!(c.streak, 3);
    }

    #[test]
    fn test_frequency_does_not_confirm() {
        // E1 is the most frequent id, but never three in a row.
        let mut t = ConfirmationTracker::new(3);
        for id in ["E1", "E1", "E2", "E1", "E1", "E2", "E1", "E1"] {
            assert!(!t.add_match(Some(id)).confirmed, "confirmed at {id}");
        }
        assert_eq!(t.streak(), 2);
    }

    #[test]
    fn test_history_bounded() {
        let mut t = ConfirmationTracker::new(2);
        for _ in 0..50 {
            t.add_match(Some("E1"));
        }
        assert_eq!(t.history().count(), 4);
        assert_eq!(t.streak(), 50);
    }

    #[test]
    fn test_history_cleared_on_candidate_change() {
        let mut t = ConfirmationTracker::new(3);
        t.add_match(Some("E1"));
        t.add_match(Some("E1"));
        t.add_match(Some("E2"));
        assert_eq!(t.history().collect::<Vec<_>>(), vec!["E2"]);
    }

    #[test]
    fn test_reset() {
        let mut t = ConfirmationTracker::new(2);
        t.add_match(Some("E1"));
        t.reset();
        assert_eq!(t.state(), &StreakState::Empty);
        assert!(!t.add_match(Some("E1")).confirmed);
        assert!(t.add_match(Some("E1")).confirmed);
    }

    #[test]
    fn test_zero_required_treated_as_one() {
        let mut t = ConfirmationTracker::new(0);
        assert_eq!(t.required(), 1);
        assert!(t.add_match(Some("E1")).confirmed);
    }
}
