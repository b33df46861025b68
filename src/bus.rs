//! Shared peripheral buses.
//!
//! The ADC and PWM drivers are process-wide resources that are not safe
//! for concurrent calls.  Each one is wrapped once in a [`SharedBus`] and
//! the handle is cloned into every thermometer or heater that needs it.
//!
//! The lock is held only for a single driver call (or a short sequence
//! that must not interleave, such as the stale-first ADC read), never for
//! a whole control iteration, so sibling loops are delayed but never
//! serialised.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Mutually exclusive handle to one peripheral driver.
pub struct SharedBus<T> {
    inner: Arc<Mutex<T>>,
}

impl<T> SharedBus<T> {
    pub fn new(driver: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(driver)),
        }
    }

    /// Acquire the bus for the lifetime of the guard.
    ///
    /// A heater thread that panicked while holding the lock leaves the
    /// driver itself intact, so poisoning is ignored.
    pub fn lock(&self) -> MutexGuard<'_, T> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with exclusive access to the driver.
    pub fn with<R>(&self, f: impl FnOnce(&mut T) -> R) -> R {
        let mut guard = self.lock();
        f(&mut guard)
    }
}

impl<T> Clone for SharedBus<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}
