//! Simulated board: a manually advanced millisecond timeline with one-shot
//! countdown slots, and a push button wired to an interrupt line.
//!
//! Handles are cheap clones over shared state so the registry, the pattern
//! matcher and the session can each hold one.

use std::cell::RefCell;
use std::rc::Rc;

use event_core::{
    Clock, Countdown, InterruptLine, IrqPriority, Level, LevelInput, LineId, Millis, Platform,
    TriggerMode,
};
use rand::SeedableRng;
use rand::rngs::StdRng;

/// Index of a countdown slot on the timeline.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerSlot(usize);

#[derive(Debug, Default)]
struct TimelineState {
    now: Millis,
    deadlines: Vec<Option<Millis>>,
}

/// Shared simulated clock.
#[derive(Clone, Debug, Default)]
pub struct SimTimeline(Rc<RefCell<TimelineState>>);

impl SimTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates a countdown slot.
    pub fn countdown(&self) -> SimCountdown {
        let mut state = self.0.borrow_mut();
        state.deadlines.push(None);
        SimCountdown {
            slot: TimerSlot(state.deadlines.len() - 1),
            timeline: self.clone(),
        }
    }

    /// Pops the earliest countdown due at or before `until`, moving the clock
    /// to its deadline. Ties go to the lowest slot.
    pub fn next_expiry(&self, until: Millis) -> Option<TimerSlot> {
        let mut state = self.0.borrow_mut();
        let (index, deadline) = state
            .deadlines
            .iter()
            .enumerate()
            .filter_map(|(index, deadline)| deadline.map(|at| (index, at)))
            .filter(|&(_, at)| at <= until)
            .min_by_key(|&(index, at)| (at, index))?;

        state.deadlines[index] = None;
        state.now = state.now.max(deadline);
        Some(TimerSlot(index))
    }

    /// Moves the clock forward to `until` without firing anything.
    pub fn settle(&self, until: Millis) {
        let mut state = self.0.borrow_mut();
        state.now = state.now.max(until);
    }
}

impl Clock for SimTimeline {
    fn now_ms(&self) -> Millis {
        self.0.borrow().now
    }
}

/// One-shot countdown bound to a timeline slot.
#[derive(Clone, Debug)]
pub struct SimCountdown {
    slot: TimerSlot,
    timeline: SimTimeline,
}

impl SimCountdown {
    pub fn slot(&self) -> TimerSlot {
        self.slot
    }

    fn deadline(&self) -> Option<Millis> {
        self.timeline.0.borrow().deadlines[self.slot.0]
    }
}

impl Countdown for SimCountdown {
    fn arm(&mut self, duration_ms: Millis) {
        let mut state = self.timeline.0.borrow_mut();
        // A zero duration still waits for the next millisecond.
        let deadline = state.now.saturating_add(duration_ms.max(1));
        state.deadlines[self.slot.0] = Some(deadline);
    }

    fn cancel(&mut self) {
        self.timeline.0.borrow_mut().deadlines[self.slot.0] = None;
    }

    fn remaining_ms(&self) -> Millis {
        let now = self.timeline.now_ms();
        self.deadline().map_or(0, |at| at.saturating_sub(now))
    }

    fn is_running(&self) -> bool {
        self.deadline().is_some()
    }
}

#[derive(Debug)]
struct ButtonState {
    level: Level,
    interrupt: Option<(TriggerMode, IrqPriority)>,
}

/// Push button with a pull-up: released reads high, pressed reads low.
#[derive(Clone, Debug)]
pub struct SimButton {
    line: LineId,
    state: Rc<RefCell<ButtonState>>,
}

impl SimButton {
    pub fn new(line: LineId) -> Self {
        Self {
            line,
            state: Rc::new(RefCell::new(ButtonState {
                level: Level::High,
                interrupt: None,
            })),
        }
    }

    /// Drives the pin. Returns the new level if it changed.
    pub fn drive(&self, level: Level) -> Option<Level> {
        let mut state = self.state.borrow_mut();
        if state.level == level {
            return None;
        }
        state.level = level;
        Some(level)
    }

    /// Returns `true` when an edge to `level` raises the line interrupt.
    pub fn fires_on(&self, level: Level) -> bool {
        self.state
            .borrow()
            .interrupt
            .is_some_and(|(mode, _)| mode.accepts(level))
    }

    pub fn interrupt(&self) -> Option<(TriggerMode, IrqPriority)> {
        self.state.borrow().interrupt
    }
}

impl LevelInput for SimButton {
    fn level(&self) -> Level {
        self.state.borrow().level
    }
}

impl InterruptLine for SimButton {
    fn line_id(&self) -> LineId {
        self.line
    }

    fn enable_interrupt(&mut self, mode: TriggerMode, priority: IrqPriority) {
        self.state.borrow_mut().interrupt = Some((mode, priority));
    }

    fn disable_interrupt(&mut self) {
        self.state.borrow_mut().interrupt = None;
    }
}

/// Board services handed to the event registry.
pub struct SimPlatform {
    timeline: SimTimeline,
    rng: StdRng,
}

impl SimPlatform {
    /// Uses a fixed seed when given so jitter is reproducible.
    pub fn new(timeline: SimTimeline, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self { timeline, rng }
    }
}

impl Clock for SimPlatform {
    fn now_ms(&self) -> Millis {
        self.timeline.now_ms()
    }
}

impl Platform for SimPlatform {
    type Countdown = SimCountdown;
    type Line = SimButton;
    type Rng = StdRng;

    fn rng(&mut self) -> &mut StdRng {
        &mut self.rng
    }
}
