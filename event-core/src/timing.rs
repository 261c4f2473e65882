//! Timing service abstraction.
//!
//! The registry and the pattern matcher never touch a hardware timer directly.
//! They arm and cancel one-shot [`Countdown`]s and read a millisecond
//! [`Clock`]. Expiry delivery is the host's job: whatever owns the countdown
//! (timer interrupt, software timer wheel, simulated timeline) calls back into
//! the owner, e.g. `EventRegistry::on_timer_expired` or
//! `Pattern::on_deadline`. The owner identity plays the role of the opaque
//! callback context.

/// Millisecond quantity used for timeouts, deadlines and timestamps.
pub type Millis = u32;

/// Monotonic millisecond clock.
pub trait Clock {
    /// Current time in milliseconds. Wraps around after `u32::MAX`.
    fn now_ms(&self) -> Millis;

    /// Milliseconds elapsed since `mark`, tolerant of a single wrap.
    fn elapsed_since(&self, mark: Millis) -> Millis {
        self.now_ms().wrapping_sub(mark)
    }
}

/// One-shot countdown provided by the timing service.
///
/// Implementations must tolerate `cancel` on an idle countdown and `arm` on a
/// running one (re-arming replaces the pending deadline).
pub trait Countdown {
    /// Arms the countdown to expire `duration_ms` from now.
    fn arm(&mut self, duration_ms: Millis);

    /// Cancels a pending expiry, if any.
    fn cancel(&mut self);

    /// Milliseconds left before expiry, `0` when idle.
    fn remaining_ms(&self) -> Millis;

    /// Returns `true` while an expiry is pending.
    fn is_running(&self) -> bool;
}

impl<T: Countdown + ?Sized> Countdown for &mut T {
    fn arm(&mut self, duration_ms: Millis) {
        (**self).arm(duration_ms);
    }

    fn cancel(&mut self) {
        (**self).cancel();
    }

    fn remaining_ms(&self) -> Millis {
        (**self).remaining_ms()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }
}
