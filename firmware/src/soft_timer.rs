//! Millisecond software timer wheel.
//!
//! One hardware tick source (the embassy time driver) drives any number of
//! one-shot [`SoftTimer`] countdowns. [`TimerWheel::tick`] is called once per
//! millisecond and returns a bitmask of the slots that expired on that tick;
//! the runtime routes each bit back to its owner.

use event_core::{Clock, Countdown, Millis};
use portable_atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};

/// Upper bound on countdowns served by one wheel (one bit per slot).
pub const MAX_SOFT_TIMERS: usize = 8;

const _: () = assert!(MAX_SOFT_TIMERS <= 32);

/// Shared tick counter plus per-slot countdown state.
pub struct TimerWheel {
    now: AtomicU32,
    allocated: AtomicUsize,
    armed: [AtomicBool; MAX_SOFT_TIMERS],
    remaining: [AtomicU32; MAX_SOFT_TIMERS],
}

impl TimerWheel {
    pub const fn new() -> Self {
        Self {
            now: AtomicU32::new(0),
            allocated: AtomicUsize::new(0),
            armed: [const { AtomicBool::new(false) }; MAX_SOFT_TIMERS],
            remaining: [const { AtomicU32::new(0) }; MAX_SOFT_TIMERS],
        }
    }

    /// Hands out the next free slot, `None` once every slot is taken.
    pub fn timer(&self) -> Option<SoftTimer<'_>> {
        let slot = self.allocated.fetch_add(1, Ordering::AcqRel);
        if slot >= MAX_SOFT_TIMERS {
            self.allocated.store(MAX_SOFT_TIMERS, Ordering::Release);
            return None;
        }
        Some(SoftTimer { wheel: self, slot })
    }

    /// Advances time by one millisecond. Returns the expired slots as a
    /// bitmask; an expired slot is disarmed before it is reported.
    pub fn tick(&self) -> u32 {
        self.now.fetch_add(1, Ordering::AcqRel);

        let mut expired = 0;
        for (slot, armed) in self.armed.iter().enumerate() {
            if !armed.load(Ordering::Acquire) {
                continue;
            }
            let left = self.remaining[slot].fetch_sub(1, Ordering::AcqRel);
            if left <= 1 {
                armed.store(false, Ordering::Release);
                self.remaining[slot].store(0, Ordering::Release);
                expired |= 1 << slot;
            }
        }
        expired
    }
}

impl Default for TimerWheel {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TimerWheel {
    fn now_ms(&self) -> Millis {
        self.now.load(Ordering::Acquire)
    }
}

/// One-shot countdown on a [`TimerWheel`] slot.
#[derive(Clone, Copy)]
pub struct SoftTimer<'a> {
    wheel: &'a TimerWheel,
    slot: usize,
}

impl SoftTimer<'_> {
    /// Slot index, i.e. the bit reported by [`TimerWheel::tick`].
    pub const fn slot(&self) -> usize {
        self.slot
    }

    /// Bit reported by [`TimerWheel::tick`] when this countdown expires.
    pub const fn mask(&self) -> u32 {
        1 << self.slot
    }
}

impl Countdown for SoftTimer<'_> {
    fn arm(&mut self, duration_ms: Millis) {
        // A zero duration still waits for the next tick.
        self.wheel.remaining[self.slot].store(duration_ms.max(1), Ordering::Release);
        self.wheel.armed[self.slot].store(true, Ordering::Release);
    }

    fn cancel(&mut self) {
        self.wheel.armed[self.slot].store(false, Ordering::Release);
        self.wheel.remaining[self.slot].store(0, Ordering::Release);
    }

    fn remaining_ms(&self) -> Millis {
        if self.is_running() {
            self.wheel.remaining[self.slot].load(Ordering::Acquire)
        } else {
            0
        }
    }

    fn is_running(&self) -> bool {
        self.wheel.armed[self.slot].load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn countdown_expires_after_its_duration() {
        let wheel = TimerWheel::new();
        let mut timer = wheel.timer().unwrap();
        timer.arm(3);

        assert_eq!(wheel.tick(), 0);
        assert_eq!(wheel.tick(), 0);
        assert_eq!(timer.remaining_ms(), 1);
        assert_eq!(wheel.tick(), timer.mask());
        assert!(!timer.is_running());
        assert_eq!(wheel.tick(), 0);
        assert_eq!(wheel.now_ms(), 4);
    }

    #[test]
    fn cancelled_countdown_never_reports() {
        let wheel = TimerWheel::new();
        let mut first = wheel.timer().unwrap();
        let mut second = wheel.timer().unwrap();
        first.arm(1);
        second.arm(1);
        first.cancel();

        assert_eq!(wheel.tick(), 0b10);
        assert_eq!(second.slot(), 1);
    }

    #[test]
    fn rearming_replaces_the_deadline() {
        let wheel = TimerWheel::new();
        let mut timer = wheel.timer().unwrap();
        timer.arm(2);
        wheel.tick();
        timer.arm(2);
        assert_eq!(wheel.tick(), 0);
        assert_eq!(wheel.tick(), 1);
    }

    #[test]
    fn slots_are_bounded() {
        let wheel = TimerWheel::new();
        for _ in 0..MAX_SOFT_TIMERS {
            assert!(wheel.timer().is_some());
        }
        assert!(wheel.timer().is_none());
        assert!(wheel.timer().is_none());
    }
}
