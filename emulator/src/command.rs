//! Console command grammar.

use std::fmt;

use winnow::ModalResult;
use winnow::ascii::{dec_uint, space0, space1};
use winnow::combinator::{alt, delimited, opt, preceded, separated_pair};
use winnow::prelude::*;

use event_core::{EventId, Millis};

/// One parsed console line.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Command {
    Press,
    Release,
    Tap,
    Advance(Millis),
    Dispatch,
    Trigger(EventId),
    Start { id: EventId, single: bool },
    Stop(EventId),
    Pause(EventId),
    Resume(EventId),
    Timeout { id: EventId, set: Option<Millis> },
    Debug { id: EventId, enabled: bool },
    Trace(bool),
    Diag,
    Pattern,
    Status,
    Help,
}

/// Rejected console line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct SyntaxError {
    pub offset: usize,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unrecognized input at column {}", self.offset + 1)
    }
}

impl std::error::Error for SyntaxError {}

pub const HELP_LINES: &[&str] = &[
    "press | release | tap          - drive the button (tap = press + release)",
    "advance <ms>                   - let simulated time pass, firing timers",
    "dispatch                       - run one main-loop dispatch pass",
    "trigger <id>                   - trigger an event manually",
    "start <id> [single]            - start an event, optionally single-shot",
    "stop <id>                      - stop an event",
    "pause <id> | resume <id>       - gate dispatch of a main-context event",
    "timeout <id> [ms]              - show or change a timer event timeout",
    "debug <id> on|off              - toggle per-event debug logging",
    "trace on|off                   - show registry and matcher debug lines",
    "diag                           - print event diagnostics",
    "pattern                        - show gesture matcher progress",
    "status                         - show clock, button and pending events",
];

/// Parses one console line.
///
/// # Errors
///
/// Returns the column where parsing stopped.
pub fn parse(line: &str) -> Result<Command, SyntaxError> {
    delimited(space0, command, space0)
        .parse(line)
        .map_err(|err| SyntaxError {
            offset: err.offset(),
        })
}

fn command(input: &mut &str) -> ModalResult<Command> {
    alt((
        "press".value(Command::Press),
        "release".value(Command::Release),
        "tap".value(Command::Tap),
        preceded("advance", millis).map(Command::Advance),
        "dispatch".value(Command::Dispatch),
        preceded("trigger", event_id).map(Command::Trigger),
        (
            preceded("start", event_id),
            opt(preceded(space1, "single")),
        )
            .map(|(id, single)| Command::Start {
                id,
                single: single.is_some(),
            }),
        preceded("stop", event_id).map(Command::Stop),
        preceded("pause", event_id).map(Command::Pause),
        preceded("resume", event_id).map(Command::Resume),
        (preceded("timeout", event_id), opt(millis))
            .map(|(id, set)| Command::Timeout { id, set }),
        preceded("debug", separated_pair(event_id, space1, on_off))
            .map(|(id, enabled)| Command::Debug { id, enabled }),
        preceded(("trace", space1), on_off).map(Command::Trace),
        "diag".value(Command::Diag),
        "pattern".value(Command::Pattern),
        "status".value(Command::Status),
        "help".value(Command::Help),
    ))
    .parse_next(input)
}

fn event_id(input: &mut &str) -> ModalResult<EventId> {
    preceded(space1, dec_uint::<_, u8, _>)
        .map(EventId::new)
        .parse_next(input)
}

fn millis(input: &mut &str) -> ModalResult<Millis> {
    preceded(space1, dec_uint).parse_next(input)
}

fn on_off(input: &mut &str) -> ModalResult<bool> {
    alt(("on".value(true), "off".value(false))).parse_next(input)
}
