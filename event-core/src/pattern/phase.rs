//! One stage of a digital pattern.

use core::fmt;

use heapless::Vec;

use super::PatternError;
use crate::level::Level;
use crate::timing::Millis;

/// Default number of expected levels per phase.
pub const MAX_STATES: usize = 8;

/// Run-time status of a phase within one pattern attempt.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PhaseStatus {
    Idle,
    InProgress,
    Complete,
    Invalid,
}

impl PhaseStatus {
    /// Human-readable label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            PhaseStatus::Idle => "Idle",
            PhaseStatus::InProgress => "In Progress",
            PhaseStatus::Complete => "Complete",
            PhaseStatus::Invalid => "Invalid",
        }
    }
}

impl fmt::Display for PhaseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Ordered sequence of expected levels that must be observed within
/// `duration_ms`.
///
/// A fixed-duration phase always lasts its full duration; a variable one ends
/// as soon as the last expected level is seen. A phase without expected levels
/// is a quiet period: it completes when its duration elapses without any
/// input activity.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Phase<const S: usize = MAX_STATES> {
    states: Vec<Level, S>,
    duration_ms: Millis,
    fixed_duration: bool,
    state_index: Option<usize>,
    status: PhaseStatus,
}

impl<const S: usize> Phase<S> {
    /// Creates an empty phase.
    #[must_use]
    pub const fn new(duration_ms: Millis, fixed_duration: bool) -> Self {
        Self {
            states: Vec::new(),
            duration_ms,
            fixed_duration,
            state_index: None,
            status: PhaseStatus::Idle,
        }
    }

    /// Appends an expected level.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::TooManyStates`] when the phase is full.
    pub fn try_add_state(&mut self, level: Level) -> Result<(), PatternError> {
        self.states
            .push(level)
            .map_err(|_| PatternError::TooManyStates { capacity: S })
    }

    /// Appends an expected level.
    ///
    /// # Panics
    ///
    /// Panics when the phase is full.
    pub fn add_state(&mut self, level: Level) {
        if let Err(err) = self.try_add_state(level) {
            panic!("{err}");
        }
    }

    /// Builder form of [`Phase::add_state`].
    ///
    /// # Panics
    ///
    /// Panics when the phase is full.
    #[must_use]
    pub fn with_state(mut self, level: Level) -> Self {
        self.add_state(level);
        self
    }

    /// Expected levels in order.
    pub fn states(&self) -> &[Level] {
        &self.states
    }

    pub const fn duration_ms(&self) -> Millis {
        self.duration_ms
    }

    pub const fn is_fixed_duration(&self) -> bool {
        self.fixed_duration
    }

    pub const fn status(&self) -> PhaseStatus {
        self.status
    }

    /// Number of expected levels matched so far, `None` before the phase
    /// starts.
    pub const fn state_index(&self) -> Option<usize> {
        self.state_index
    }

    /// Returns `true` for a phase without expected levels.
    pub fn is_quiet(&self) -> bool {
        self.states.is_empty()
    }

    pub(crate) fn begin(&mut self) {
        self.state_index = Some(0);
        self.status = PhaseStatus::InProgress;
    }

    pub(crate) fn expected(&self) -> Option<Level> {
        self.states.get(self.state_index?).copied()
    }

    /// Advances past the expected level and returns the new match count.
    pub(crate) fn advance(&mut self) -> usize {
        let next = self.state_index.map_or(1, |index| index + 1);
        self.state_index = Some(next);
        next
    }

    pub(crate) fn all_matched(&self) -> bool {
        self.state_index == Some(self.states.len())
    }

    pub(crate) fn mark(&mut self, status: PhaseStatus) {
        self.status = status;
    }

    pub(crate) fn reset(&mut self) {
        self.status = PhaseStatus::Idle;
        self.state_index = None;
    }
}
