//! User button as an event-core interrupt line.
//!
//! The EXTI task owns the real pin and mirrors every edge into a
//! [`ButtonPin`]; the registry and the gesture matcher see the button through
//! cheap [`ButtonLine`] handles that read the mirror and toggle its interrupt
//! enable.

use event_core::{InterruptLine, IrqPriority, Level, LevelInput, LineId, TriggerMode};
use portable_atomic::{AtomicBool, AtomicU8, Ordering};

const DISABLED: u8 = 0;
const RISING: u8 = 1;
const FALLING: u8 = 2;
const BOTH: u8 = 3;

/// Interrupt-safe mirror of the button pin.
pub struct ButtonPin {
    high: AtomicBool,
    mode: AtomicU8,
    priority: AtomicU8,
}

impl ButtonPin {
    /// The button idles high (pull-up, pressed pulls low).
    pub const fn new() -> Self {
        Self {
            high: AtomicBool::new(true),
            mode: AtomicU8::new(DISABLED),
            priority: AtomicU8::new(0),
        }
    }

    /// Stores the sampled level. Returns `None` when the level did not
    /// change, otherwise whether the line interrupt is enabled for the edge.
    pub fn record_edge(&self, level: Level) -> Option<bool> {
        let previous = self.high.swap(level.is_high(), Ordering::AcqRel);
        if previous == level.is_high() {
            return None;
        }
        let mode = decode_mode(self.mode.load(Ordering::Acquire));
        Some(mode.is_some_and(|mode| mode.accepts(level)))
    }

    pub fn level(&self) -> Level {
        Level::from(self.high.load(Ordering::Acquire))
    }

    /// Trigger mode and priority while the interrupt is enabled.
    pub fn interrupt(&self) -> Option<(TriggerMode, IrqPriority)> {
        let mode = decode_mode(self.mode.load(Ordering::Acquire))?;
        Some((mode, decode_priority(self.priority.load(Ordering::Acquire))))
    }
}

impl Default for ButtonPin {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle bound to one [`ButtonPin`] and its EXTI line number.
#[derive(Clone, Copy)]
pub struct ButtonLine<'a> {
    line: LineId,
    pin: &'a ButtonPin,
}

impl<'a> ButtonLine<'a> {
    pub const fn new(line: LineId, pin: &'a ButtonPin) -> Self {
        Self { line, pin }
    }
}

impl LevelInput for ButtonLine<'_> {
    fn level(&self) -> Level {
        self.pin.level()
    }
}

impl InterruptLine for ButtonLine<'_> {
    fn line_id(&self) -> LineId {
        self.line
    }

    fn enable_interrupt(&mut self, mode: TriggerMode, priority: IrqPriority) {
        self.pin
            .priority
            .store(encode_priority(priority), Ordering::Release);
        self.pin.mode.store(encode_mode(mode), Ordering::Release);
    }

    fn disable_interrupt(&mut self) {
        self.pin.mode.store(DISABLED, Ordering::Release);
    }
}

const fn encode_mode(mode: TriggerMode) -> u8 {
    match mode {
        TriggerMode::Rising => RISING,
        TriggerMode::Falling => FALLING,
        TriggerMode::Both => BOTH,
    }
}

const fn decode_mode(raw: u8) -> Option<TriggerMode> {
    match raw {
        RISING => Some(TriggerMode::Rising),
        FALLING => Some(TriggerMode::Falling),
        BOTH => Some(TriggerMode::Both),
        _ => None,
    }
}

const fn encode_priority(priority: IrqPriority) -> u8 {
    match priority {
        IrqPriority::VeryLow => 0,
        IrqPriority::Low => 1,
        IrqPriority::Medium => 2,
        IrqPriority::High => 3,
        IrqPriority::VeryHigh => 4,
    }
}

const fn decode_priority(raw: u8) -> IrqPriority {
    match raw {
        0 => IrqPriority::VeryLow,
        1 => IrqPriority::Low,
        2 => IrqPriority::Medium,
        3 => IrqPriority::High,
        _ => IrqPriority::VeryHigh,
    }
}
