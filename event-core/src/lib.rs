#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Event scheduling and digital pattern matching shared by firmware and host
// tooling.
//
// The crate avoids the Rust standard library so the same registry and matcher
// run inside interrupt handlers on the MCU and inside the host emulator. All
// hardware access goes through the traits in `timing` and `level`.

#[macro_use]
pub mod log;

pub mod event;
pub mod level;
pub mod pattern;
pub mod shared;
pub mod timing;

pub use event::{
    EventConfig, EventId, EventKind, EventRegistry, ExecutionContext, Platform, RegistryError,
};
pub use level::{InterruptLine, IrqPriority, Level, LevelInput, LineId, TriggerMode};
pub use log::{LogLevel, LogSink};
pub use pattern::{Pattern, PatternError, PatternProgress, Phase, PhaseStatus, ResetReason};
pub use shared::Shared;
pub use timing::{Clock, Countdown, Millis};
