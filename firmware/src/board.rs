//! Board wiring and application timing constants.

use event_core::{LineId, Millis};

/// User button on PA0 (EXTI0), active low with the internal pull-up.
pub const BUTTON_EXTI_LINE: LineId = 0;

pub const HEARTBEAT_PERIOD_MS: Millis = 1_000;
pub const HEARTBEAT_JITTER_MS: Millis = 100;
pub const DIAGNOSTICS_PERIOD_MS: Millis = 30_000;

/// Press and release must both land inside this window, twice in a row.
pub const CLICK_WINDOW_MS: Millis = 400;

/// Longest the main loop sleeps without a wake signal.
pub const IDLE_POLL_MS: u64 = 100;
