//! Event registry data model.
//!
//! Three kinds of work sources share one registration and dispatch model:
//! manually triggered General events, Timer events armed on a [`Countdown`]
//! (optionally with random jitter on every re-arm), and Interrupt events bound
//! to an [`InterruptLine`]. Each event also carries an [`ExecutionContext`]
//! that decides whether its callback runs at trigger time or from the
//! main-loop dispatch pass.

use core::fmt;

use rand::RngCore;

use crate::level::{InterruptLine, IrqPriority, TriggerMode};
use crate::timing::{Clock, Countdown, Millis};

pub mod diagnostics;
pub mod registry;

pub use diagnostics::{EventName, EventSnapshot};
pub use registry::EventRegistry;

/// Default capacity of the event table.
pub const MAX_EVENTS: usize = 32;

/// Timer events below this timeout have been observed to miss expiries when
/// the device sleeps with heavy debug logging; starting one logs a warning.
pub const MIN_RECOMMENDED_TIMEOUT_MS: Millis = 6;

/// Callback run when an event is dispatched.
///
/// The `Sync` bound lets a registry holding callbacks live in a `static`
/// shared with interrupt handlers.
pub type Callback<'a> = &'a (dyn Fn() + Sync);

/// Stable identifier assigned at registration; equals the table slot.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct EventId(u8);

impl EventId {
    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Raw identifier value.
    #[must_use]
    pub const fn raw(self) -> u8 {
        self.0
    }

    /// Table index for this identifier.
    #[must_use]
    pub const fn as_index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which arming path an event uses.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EventKind {
    General,
    Timer,
    Interrupt,
}

impl EventKind {
    /// Short label used in logs and diagnostics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            EventKind::General => "general",
            EventKind::Timer => "timer",
            EventKind::Interrupt => "interrupt",
        }
    }
}

/// Where an event callback runs once triggered.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ExecutionContext {
    /// Deferred to [`EventRegistry::process_main_events`].
    Main,
    /// Run synchronously inside whatever context delivered the trigger,
    /// including timer and GPIO interrupt handlers.
    Immediate,
}

/// Common registration parameters.
#[derive(Copy, Clone)]
pub struct EventConfig<'a> {
    pub name: Option<&'static str>,
    pub callback: Callback<'a>,
    pub context: ExecutionContext,
}

impl<'a> EventConfig<'a> {
    /// Unnamed event; diagnostics fall back to `EVENT<id>`.
    #[must_use]
    pub const fn new(callback: Callback<'a>, context: ExecutionContext) -> Self {
        Self {
            name: None,
            callback,
            context,
        }
    }

    /// Event processed from the main loop.
    #[must_use]
    pub const fn main(name: &'static str, callback: Callback<'a>) -> Self {
        Self::new(callback, ExecutionContext::Main).named(name)
    }

    /// Event processed at trigger time.
    #[must_use]
    pub const fn immediate(name: &'static str, callback: Callback<'a>) -> Self {
        Self::new(callback, ExecutionContext::Immediate).named(name)
    }

    /// Attaches a human-readable name.
    #[must_use]
    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }
}

/// Board services the registry depends on.
///
/// Bundles the clock used for diagnostics, the countdown and interrupt line
/// types stored in the table, and the random source used for timer jitter.
pub trait Platform: Clock {
    type Countdown: Countdown;
    type Line: InterruptLine;
    type Rng: RngCore;

    /// Random source for timer jitter.
    fn rng(&mut self) -> &mut Self::Rng;
}

/// Timer-kind parameters.
pub struct TimerSource<C> {
    pub(crate) countdown: C,
    pub(crate) timeout_ms: Millis,
    pub(crate) jitter_max_ms: Millis,
}

/// Interrupt-kind parameters.
pub struct InterruptSource<L> {
    pub(crate) line: L,
    pub(crate) mode: TriggerMode,
    pub(crate) priority: IrqPriority,
}

/// Arming source of a registered event.
pub enum EventSource<C, L> {
    General,
    Timer(TimerSource<C>),
    Interrupt(InterruptSource<L>),
}

impl<C, L> EventSource<C, L> {
    /// Kind implied by the source variant.
    pub const fn kind(&self) -> EventKind {
        match self {
            EventSource::General => EventKind::General,
            EventSource::Timer(_) => EventKind::Timer,
            EventSource::Interrupt(_) => EventKind::Interrupt,
        }
    }
}

/// Failure reported by the fallible registration calls.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    /// Every slot of the fixed-size table is taken.
    CapacityExhausted { capacity: usize },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::CapacityExhausted { capacity } => {
                write!(f, "event table full ({capacity} slots)")
            }
        }
    }
}
