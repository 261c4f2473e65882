//! Per-event counters and the human-readable diagnostics dump.

use core::fmt;

use super::{EventId, EventKind, ExecutionContext};
use crate::timing::Millis;

/// Counters kept for every event. Reset only by starting the event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct EventDiagnostics {
    pub(crate) debug_enabled: bool,
    pub(crate) start_time_ms: Millis,
    pub(crate) trigger_count: u16,
    pub(crate) process_count: u16,
}

impl EventDiagnostics {
    pub(crate) const fn new() -> Self {
        Self {
            debug_enabled: true,
            start_time_ms: 0,
            trigger_count: 0,
            process_count: 0,
        }
    }

    /// Zeroes the counters and stamps a new start time. The debug flag is a
    /// setting, not a counter, and survives.
    pub(crate) fn restart(&mut self, now: Millis) {
        self.start_time_ms = now;
        self.trigger_count = 0;
        self.process_count = 0;
    }

    pub(crate) fn record_trigger(&mut self) {
        self.trigger_count = self.trigger_count.wrapping_add(1);
    }

    pub(crate) fn record_process(&mut self) {
        self.process_count = self.process_count.wrapping_add(1);
    }
}

/// Display name of an event, synthesized from the id when none was given.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EventName {
    id: EventId,
    name: Option<&'static str>,
}

impl EventName {
    pub(crate) const fn new(id: EventId, name: Option<&'static str>) -> Self {
        Self { id, name }
    }

    /// Name supplied at registration, if any.
    #[must_use]
    pub const fn given(&self) -> Option<&'static str> {
        self.name
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name {
            Some(name) => f.write_str(name),
            None => write!(f, "EVENT{}", self.id.raw()),
        }
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for EventName {
    fn format(&self, f: defmt::Formatter<'_>) {
        match self.name {
            Some(name) => defmt::write!(f, "{=str}", name),
            None => defmt::write!(f, "EVENT{=u8}", self.id.raw()),
        }
    }
}

/// Point-in-time view of one event.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct EventSnapshot {
    pub id: EventId,
    pub name: EventName,
    pub kind: EventKind,
    pub context: ExecutionContext,
    pub triggered: bool,
    pub paused: bool,
    pub single: bool,
    pub debug_enabled: bool,
    pub trigger_count: u16,
    pub process_count: u16,
    pub elapsed_since_start_ms: Millis,
}

impl fmt::Display for EventSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tenths = self.elapsed_since_start_ms / 100;
        write!(
            f,
            "{}: triggered={}, processed={}, elapsedSinceStart={}.{}s",
            self.name,
            self.trigger_count,
            self.process_count,
            tenths / 10,
            tenths % 10,
        )
    }
}

pub(crate) const DIAGNOSTICS_RULE: &str = "--------------------";
pub(crate) const DIAGNOSTICS_TITLE: &str = "Event diagnostics";

/// Writes the framed dump used by `EventRegistry::write_diagnostics`.
pub(crate) fn write_report<W, I>(out: &mut W, snapshots: I) -> fmt::Result
where
    W: fmt::Write,
    I: IntoIterator<Item = EventSnapshot>,
{
    writeln!(out, "{DIAGNOSTICS_RULE}")?;
    writeln!(out, "{DIAGNOSTICS_TITLE}")?;
    for snapshot in snapshots {
        writeln!(out, "{snapshot}")?;
    }
    writeln!(out, "{DIAGNOSTICS_RULE}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use heapless::String;

    fn snapshot(name: Option<&'static str>, elapsed: Millis) -> EventSnapshot {
        EventSnapshot {
            id: EventId::new(3),
            name: EventName::new(EventId::new(3), name),
            kind: EventKind::Timer,
            context: ExecutionContext::Main,
            triggered: false,
            paused: false,
            single: false,
            debug_enabled: true,
            trigger_count: 7,
            process_count: 5,
            elapsed_since_start_ms: elapsed,
        }
    }

    #[test]
    fn unnamed_events_use_synthesized_label() {
        let mut out = String::<64>::new();
        fmt::write(&mut out, format_args!("{}", snapshot(None, 0).name)).unwrap();
        assert_eq!(out.as_str(), "EVENT3");
    }

    #[test]
    fn snapshot_line_reports_counts_and_seconds() {
        let mut out = String::<96>::new();
        fmt::write(&mut out, format_args!("{}", snapshot(Some("blink"), 12_345))).unwrap();
        assert_eq!(
            out.as_str(),
            "blink: triggered=7, processed=5, elapsedSinceStart=12.3s"
        );
    }

    #[test]
    fn counters_wrap_instead_of_overflowing() {
        let mut diagnostics = EventDiagnostics::new();
        diagnostics.trigger_count = u16::MAX;
        diagnostics.record_trigger();
        assert_eq!(diagnostics.trigger_count, 0);
        assert!(diagnostics.debug_enabled);
    }

    #[test]
    fn restart_zeroes_counters_but_keeps_debug_flag() {
        let mut diagnostics = EventDiagnostics::new();
        diagnostics.debug_enabled = false;
        diagnostics.record_trigger();
        diagnostics.record_process();

        diagnostics.restart(1_500);
        assert_eq!(diagnostics.trigger_count, 0);
        assert_eq!(diagnostics.process_count, 0);
        assert_eq!(diagnostics.start_time_ms, 1_500);
        assert!(!diagnostics.debug_enabled);
    }
}
