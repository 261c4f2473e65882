//! Log lines for application events.
//!
//! On the MCU the lines go out over defmt/RTT; host builds print them so the
//! app wiring can be exercised under `cargo test`.

use event_core::{Millis, PatternProgress};

/// Reports a dispatched application event.
pub fn event(name: &'static str, at_ms: Millis) {
    emit_event(name, at_ms);
}

/// Reports the gesture matcher outcomes worth a log line.
pub fn gesture(progress: PatternProgress, at_ms: Millis) {
    match progress {
        PatternProgress::Complete => emit_gesture("recognised", at_ms),
        PatternProgress::Reset(reason) => emit_gesture(reason.label(), at_ms),
        _ => {}
    }
}

#[cfg(target_os = "none")]
fn emit_event(name: &'static str, at_ms: Millis) {
    defmt::info!("event:{} t={}ms", name, at_ms);
}

#[cfg(not(target_os = "none"))]
fn emit_event(name: &'static str, at_ms: Millis) {
    println!("event:{name} t={at_ms}ms");
}

#[cfg(target_os = "none")]
fn emit_gesture(outcome: &'static str, at_ms: Millis) {
    defmt::info!("gesture:{} t={}ms", outcome, at_ms);
}

#[cfg(not(target_os = "none"))]
fn emit_gesture(outcome: &'static str, at_ms: Millis) {
    println!("gesture:{outcome} t={at_ms}ms");
}
