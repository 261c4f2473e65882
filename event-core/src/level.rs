//! Binary input abstraction.
//!
//! [`LevelInput`] is all the pattern matcher needs. Interrupt-driven events
//! additionally require an [`InterruptLine`], which can enable or disable an
//! edge interrupt and reports the [`LineId`] the host uses to route a firing
//! back to `EventRegistry::on_interrupt`.

use core::fmt;

/// Identifier of an external interrupt line (EXTI number on STM32).
pub type LineId = u8;

/// Sampled logic level of a digital input.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl Level {
    /// Returns `true` for [`Level::High`].
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Level::High)
    }

    /// Returns the opposite level.
    #[must_use]
    pub const fn toggled(self) -> Self {
        match self {
            Level::Low => Level::High,
            Level::High => Level::Low,
        }
    }
}

impl From<bool> for Level {
    fn from(high: bool) -> Self {
        if high { Level::High } else { Level::Low }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Low => f.write_str("LOW"),
            Level::High => f.write_str("HIGH"),
        }
    }
}

/// Edge selection for interrupt-driven events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TriggerMode {
    Rising,
    Falling,
    Both,
}

impl TriggerMode {
    /// Returns `true` when a transition to `level` should fire the interrupt.
    #[must_use]
    pub const fn accepts(self, level: Level) -> bool {
        match self {
            TriggerMode::Rising => matches!(level, Level::High),
            TriggerMode::Falling => matches!(level, Level::Low),
            TriggerMode::Both => true,
        }
    }
}

/// Interrupt priority requested when enabling a line.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum IrqPriority {
    VeryLow,
    Low,
    Medium,
    High,
    VeryHigh,
}

/// Readable binary input.
pub trait LevelInput {
    /// Samples the current level.
    fn level(&self) -> Level;
}

impl<T: LevelInput + ?Sized> LevelInput for &T {
    fn level(&self) -> Level {
        (**self).level()
    }
}

/// Input line able to raise edge interrupts.
pub trait InterruptLine: LevelInput {
    /// Line number used to correlate a firing back to this source.
    fn line_id(&self) -> LineId;

    /// Enables the edge interrupt with the given mode and priority.
    fn enable_interrupt(&mut self, mode: TriggerMode, priority: IrqPriority);

    /// Disables the edge interrupt.
    fn disable_interrupt(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_modes_filter_edges() {
        assert!(TriggerMode::Rising.accepts(Level::High));
        assert!(!TriggerMode::Rising.accepts(Level::Low));
        assert!(TriggerMode::Falling.accepts(Level::Low));
        assert!(!TriggerMode::Falling.accepts(Level::High));
        assert!(TriggerMode::Both.accepts(Level::Low));
        assert!(TriggerMode::Both.accepts(Level::High));
    }

    #[test]
    fn levels_convert_from_bool() {
        assert_eq!(Level::from(true), Level::High);
        assert_eq!(Level::from(false), Level::Low);
        assert_eq!(Level::High.toggled(), Level::Low);
    }
}
