#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use event_core::{
    Clock, Countdown, InterruptLine, IrqPriority, Level, LevelInput, LineId, Millis, Platform,
    TriggerMode,
};
use rand::SeedableRng;
use rand::rngs::SmallRng;

/// Observable state of one [`MockCountdown`].
#[derive(Debug, Default)]
pub struct CountdownState {
    pub arms: Vec<Millis>,
    pub cancels: usize,
    pub remaining: Option<Millis>,
}

/// Countdown that records every arm and cancel; cloning shares the state.
#[derive(Clone, Debug, Default)]
pub struct MockCountdown(Rc<RefCell<CountdownState>>);

impl MockCountdown {
    pub fn arms(&self) -> Vec<Millis> {
        self.0.borrow().arms.clone()
    }

    pub fn last_arm(&self) -> Option<Millis> {
        self.0.borrow().arms.last().copied()
    }

    pub fn cancels(&self) -> usize {
        self.0.borrow().cancels
    }

    /// Simulates the hardware timer running out.
    pub fn expire(&self) {
        self.0.borrow_mut().remaining = None;
    }
}

impl Countdown for MockCountdown {
    fn arm(&mut self, duration_ms: Millis) {
        let mut state = self.0.borrow_mut();
        state.arms.push(duration_ms);
        state.remaining = Some(duration_ms);
    }

    fn cancel(&mut self) {
        let mut state = self.0.borrow_mut();
        state.cancels += 1;
        state.remaining = None;
    }

    fn remaining_ms(&self) -> Millis {
        self.0.borrow().remaining.unwrap_or(0)
    }

    fn is_running(&self) -> bool {
        self.0.borrow().remaining.is_some()
    }
}

#[derive(Debug, Default)]
pub struct LineState {
    pub level: Option<Level>,
    pub enabled: Option<(TriggerMode, IrqPriority)>,
    pub disables: usize,
}

/// Interrupt line with a settable level; cloning shares the state.
#[derive(Clone, Debug)]
pub struct MockLine {
    id: LineId,
    state: Rc<RefCell<LineState>>,
}

impl MockLine {
    pub fn new(id: LineId) -> Self {
        Self {
            id,
            state: Rc::default(),
        }
    }

    pub fn set_level(&self, level: Level) {
        self.state.borrow_mut().level = Some(level);
    }

    pub fn enabled(&self) -> Option<(TriggerMode, IrqPriority)> {
        self.state.borrow().enabled
    }

    pub fn disables(&self) -> usize {
        self.state.borrow().disables
    }
}

impl LevelInput for MockLine {
    fn level(&self) -> Level {
        self.state.borrow().level.unwrap_or(Level::High)
    }
}

impl InterruptLine for MockLine {
    fn line_id(&self) -> LineId {
        self.id
    }

    fn enable_interrupt(&mut self, mode: TriggerMode, priority: IrqPriority) {
        self.state.borrow_mut().enabled = Some((mode, priority));
    }

    fn disable_interrupt(&mut self) {
        let mut state = self.state.borrow_mut();
        state.enabled = None;
        state.disables += 1;
    }
}

/// Clock, random source and board types for registry tests.
pub struct MockPlatform {
    pub now: Rc<Cell<Millis>>,
    rng: SmallRng,
}

impl MockPlatform {
    pub fn new(seed: u64) -> Self {
        Self {
            now: Rc::default(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Clock for MockPlatform {
    fn now_ms(&self) -> Millis {
        self.now.get()
    }
}

impl Platform for MockPlatform {
    type Countdown = MockCountdown;
    type Line = MockLine;
    type Rng = SmallRng;

    fn rng(&mut self) -> &mut SmallRng {
        &mut self.rng
    }
}

/// Level source driven by the test body.
#[derive(Clone, Debug, Default)]
pub struct MockInput(Rc<Cell<Option<Level>>>);

impl MockInput {
    pub fn set(&self, level: Level) {
        self.0.set(Some(level));
    }
}

impl LevelInput for MockInput {
    fn level(&self) -> Level {
        self.0.get().unwrap_or(Level::Low)
    }
}
