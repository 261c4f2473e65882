//! Timed digital pattern matcher.
//!
//! A [`Pattern`] is an ordered list of [`Phase`]s, each an ordered list of
//! expected input levels with a time budget. [`Pattern::on_input`] is called
//! on every input stimulus (typically from the edge interrupt of the watched
//! line) and samples the level; [`Pattern::on_deadline`] is called when the
//! shared phase countdown expires. The pattern is complete when the last phase
//! completes within its budget; [`Pattern::check_complete`] reports that once
//! and rearms the matcher.
//!
//! Wrong or late input is not an error. Any failed attempt resets every phase
//! to idle so the next stimulus starts a fresh attempt.

use core::fmt;

use heapless::Vec;

use crate::level::LevelInput;
use crate::timing::Countdown;

mod phase;

pub use phase::{MAX_STATES, Phase, PhaseStatus};

/// Default number of phases per pattern.
pub const MAX_PHASES: usize = 3;

/// Construction failures.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternError {
    TooManyPhases { capacity: usize },
    TooManyStates { capacity: usize },
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternError::TooManyPhases { capacity } => {
                write!(f, "pattern holds at most {capacity} phases")
            }
            PatternError::TooManyStates { capacity } => {
                write!(f, "phase holds at most {capacity} states")
            }
        }
    }
}

/// Why an attempt was abandoned.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ResetReason {
    /// The phase budget elapsed before its levels were all observed.
    DeadlineExceeded,
    /// Input arrived on a phase that had already completed.
    ExtraInput,
    /// Input arrived during a phase that expects none.
    QuietPhaseDisturbed,
    /// Strict mode only: the sampled level differed from the expected one.
    WrongLevel,
}

impl ResetReason {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            ResetReason::DeadlineExceeded => "deadline exceeded",
            ResetReason::ExtraInput => "additional input after phase completed",
            ResetReason::QuietPhaseDisturbed => "input during quiet phase",
            ResetReason::WrongLevel => "unexpected level",
        }
    }
}

/// Outcome of one stimulus or deadline, for logging and tests.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PatternProgress {
    /// Nothing to do (no phases, or a stale deadline).
    Ignored,
    /// The expected level was seen; `matched` levels of `phase` are done.
    Matched { phase: usize, matched: usize },
    /// The sampled level was not the expected one; no progress.
    Mismatched { phase: usize },
    /// A fixed-duration phase saw all its levels and waits for its deadline.
    PhaseComplete { phase: usize },
    /// The deadline moved the attempt on to `phase`.
    PhaseStarted { phase: usize },
    /// The last phase completed.
    Complete,
    /// The attempt was abandoned and every phase is idle again.
    Reset(ResetReason),
}

/// Pattern matcher bound to one input and one phase countdown.
pub struct Pattern<I, C, const P: usize = MAX_PHASES, const S: usize = MAX_STATES> {
    input: I,
    countdown: C,
    phases: Vec<Phase<S>, P>,
    phase_index: Option<usize>,
    complete: bool,
    strict: bool,
    resets: u16,
}

impl<I, C, const P: usize, const S: usize> Pattern<I, C, P, S>
where
    I: LevelInput,
    C: Countdown,
{
    /// Creates a pattern without phases.
    pub const fn new(input: I, countdown: C) -> Self {
        Self {
            input,
            countdown,
            phases: Vec::new(),
            phase_index: None,
            complete: false,
            strict: false,
            resets: 0,
        }
    }

    /// Appends a phase.
    ///
    /// # Errors
    ///
    /// Returns [`PatternError::TooManyPhases`] when the pattern is full.
    pub fn try_add_phase(&mut self, phase: Phase<S>) -> Result<(), PatternError> {
        self.phases
            .push(phase)
            .map_err(|_| PatternError::TooManyPhases { capacity: P })
    }

    /// Appends a phase.
    ///
    /// # Panics
    ///
    /// Panics when the pattern is full.
    pub fn add_phase(&mut self, phase: Phase<S>) {
        if let Err(err) = self.try_add_phase(phase) {
            panic!("{err}");
        }
    }

    /// In strict mode a wrong level on an in-progress phase abandons the
    /// attempt immediately instead of waiting for the deadline.
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub const fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn phases(&self) -> &[Phase<S>] {
        &self.phases
    }

    pub fn phase(&self, index: usize) -> Option<&Phase<S>> {
        self.phases.get(index)
    }

    /// Index of the active phase, `None` before the first stimulus.
    pub const fn phase_index(&self) -> Option<usize> {
        self.phase_index
    }

    /// Completion flag, without clearing it.
    pub const fn is_complete(&self) -> bool {
        self.complete
    }

    /// Number of abandoned attempts since construction.
    pub const fn reset_count(&self) -> u16 {
        self.resets
    }

    pub fn input(&self) -> &I {
        &self.input
    }

    pub fn countdown(&self) -> &C {
        &self.countdown
    }

    /// Samples the input after a stimulus.
    ///
    /// The first stimulus starts the attempt and arms the countdown for the
    /// first phase.
    pub fn on_input(&mut self) -> PatternProgress {
        if self.phases.is_empty() {
            return PatternProgress::Ignored;
        }

        let index = *self.phase_index.get_or_insert(0);
        let progress = self.sample(index);
        self.log_progress();
        progress
    }

    fn sample(&mut self, index: usize) -> PatternProgress {
        let phase = &mut self.phases[index];

        if phase.is_quiet() {
            debug!("Input during quiet phase {}", index + 1);
            return self.invalidate(index, ResetReason::QuietPhaseDisturbed);
        }

        if phase.status() == PhaseStatus::Idle {
            debug!("Starting phase {}", index + 1);
            phase.begin();
            // Later phases are armed by the deadline that starts them.
            if index == 0 {
                self.countdown.arm(phase.duration_ms());
            }
        }

        match phase.status() {
            PhaseStatus::InProgress => {
                let level = self.input.level();
                let matched = phase.expected() == Some(level);
                let count = if matched { phase.advance() } else { 0 };

                if !matched && self.strict {
                    return self.invalidate(index, ResetReason::WrongLevel);
                }

                if phase.all_matched() {
                    phase.mark(PhaseStatus::Complete);
                    debug!("Phase {} complete", index + 1);
                    if !phase.is_fixed_duration() {
                        // Done early; run the deadline logic now.
                        self.countdown.cancel();
                        return self.on_deadline();
                    }
                    return PatternProgress::PhaseComplete { phase: index };
                }

                if matched {
                    PatternProgress::Matched {
                        phase: index,
                        matched: count,
                    }
                } else {
                    PatternProgress::Mismatched { phase: index }
                }
            }
            PhaseStatus::Complete => {
                debug!("Additional invalid input detected");
                self.invalidate(index, ResetReason::ExtraInput)
            }
            PhaseStatus::Idle | PhaseStatus::Invalid => PatternProgress::Ignored,
        }
    }

    /// Handles expiry of the phase countdown.
    pub fn on_deadline(&mut self) -> PatternProgress {
        if self.complete {
            return PatternProgress::Ignored;
        }
        let Some(index) = self.phase_index else {
            return PatternProgress::Ignored;
        };
        let Some(phase) = self.phases.get(index) else {
            return PatternProgress::Ignored;
        };

        let quiet = phase.is_quiet();
        if phase.status() != PhaseStatus::Complete && !quiet {
            debug!("Phase {} failure", index + 1);
            return self.invalidate(index, ResetReason::DeadlineExceeded);
        }
        if quiet && phase.status() != PhaseStatus::Idle {
            return self.invalidate(index, ResetReason::QuietPhaseDisturbed);
        }

        let next = index + 1;
        if next == self.phases.len() {
            self.complete = true;
            info!("Pattern complete");
            return PatternProgress::Complete;
        }

        self.phase_index = Some(next);
        let phase = &mut self.phases[next];
        // A quiet phase stays idle so that any input against it shows.
        if !phase.is_quiet() {
            phase.begin();
        }
        debug!("Next phase of {}ms starting", phase.duration_ms());
        self.countdown.arm(phase.duration_ms());
        PatternProgress::PhaseStarted { phase: next }
    }

    /// Reports and clears completion. A `true` result also rearms the matcher
    /// for the next attempt, so reading and resetting cannot race a new
    /// stimulus.
    pub fn check_complete(&mut self) -> bool {
        if !self.complete {
            return false;
        }
        self.reset();
        true
    }

    /// Returns every phase to idle, stops the countdown and clears the
    /// completion flag.
    pub fn reset(&mut self) {
        for phase in &mut self.phases {
            phase.reset();
        }
        self.countdown.cancel();
        self.complete = false;
        self.phase_index = None;
        debug!("Resetting pattern");
    }

    fn invalidate(&mut self, index: usize, reason: ResetReason) -> PatternProgress {
        if let Some(phase) = self.phases.get_mut(index) {
            phase.mark(PhaseStatus::Invalid);
        }
        debug!("Phase {} invalid: {}", index + 1, reason.label());
        self.resets = self.resets.wrapping_add(1);
        self.reset();
        PatternProgress::Reset(reason)
    }

    fn log_progress(&self) {
        let Some(index) = self.phase_index else {
            return;
        };
        let phase = &self.phases[index];
        debug!(
            "Pattern phase {} of {}: {}ms left, status {}, state {} of {}",
            index + 1,
            self.phases.len(),
            self.countdown.remaining_ms(),
            phase.status().label(),
            phase.state_index().unwrap_or(0),
            phase.states().len()
        );
    }

    /// Writes a one-line summary of the active phase.
    ///
    /// # Errors
    ///
    /// Propagates errors from `out`.
    pub fn write_progress<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        let Some(index) = self.phase_index else {
            return write!(out, "Pattern idle ({} phases)", self.phases.len());
        };
        let phase = &self.phases[index];
        write!(
            out,
            "Pattern phase {} of {}: {}ms left, status {}, state {} of {}",
            index + 1,
            self.phases.len(),
            self.countdown.remaining_ms(),
            phase.status(),
            phase.state_index().unwrap_or(0),
            phase.states().len()
        )
    }
}
