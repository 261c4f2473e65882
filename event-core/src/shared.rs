//! Interrupt-safe ownership wrapper.
//!
//! The registry and the pattern matcher are single-owner `&mut self` state
//! machines. [`Shared`] lets such a value live in a `static` reachable from
//! both interrupt handlers and the main loop: every access runs inside a
//! critical section, so composite updates are never observed half done.

use core::cell::RefCell;

use critical_section::Mutex;

/// Value guarded by a critical section.
pub struct Shared<T> {
    inner: Mutex<RefCell<T>>,
}

impl<T> Shared<T> {
    /// Wraps `value`.
    pub const fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(value)),
        }
    }

    /// Runs `f` with exclusive access inside a critical section.
    ///
    /// # Panics
    ///
    /// Panics when called re-entrantly from within `f`, e.g. by a callback
    /// that tries to reach the same registry it was dispatched from.
    pub fn lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        critical_section::with(|cs| {
            let mut guard = self.inner.borrow_ref_mut(cs);
            f(&mut guard)
        })
    }

    /// Like [`Shared::lock`] but returns `None` instead of panicking when the
    /// value is already borrowed.
    pub fn try_lock<R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        critical_section::with(|cs| {
            let cell = self.inner.borrow(cs);
            let mut guard = cell.try_borrow_mut().ok()?;
            Some(f(&mut guard))
        })
    }

    /// Consumes the wrapper and returns the value.
    pub fn into_inner(self) -> T {
        self.inner.into_inner().into_inner()
    }
}
