//! Blocking locks for process threads.
//!
//! A process that unwinds (on `exit` or a fault) never holds one of these
//! locks, but a panicking kernel path might. Poisoning is ignored so that the
//! remaining processes can still make progress and report the failure.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Default)]
pub struct SleepLock<T>(Mutex<T>);

pub type SleepLockGuard<'a, T> = MutexGuard<'a, T>;

impl<T> SleepLock<T> {
    pub const fn new(value: T) -> Self {
        Self(Mutex::new(value))
    }

    /// Acquires the lock.
    ///
    /// Sleeps until the lock is acquired.
    pub fn lock(&self) -> SleepLockGuard<'_, T> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get_mut(&mut self) -> &mut T {
        self.0.get_mut().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> mutex_api::Mutex for SleepLock<T> {
    type Data = T;
    type Guard<'a>
        = SleepLockGuard<'a, T>
    where
        T: 'a;

    fn new(data: Self::Data) -> Self {
        Self::new(data)
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.lock()
    }

    fn get_mut(&mut self) -> &mut Self::Data {
        self.get_mut()
    }
}

/// A condition variable paired with a [`SleepLock`].
#[derive(Debug, Default)]
pub struct SleepLockCondVar(Condvar);

impl SleepLockCondVar {
    pub const fn new() -> Self {
        Self(Condvar::new())
    }

    /// Atomically releases `guard` and sleeps until notified.
    ///
    /// Reacquires the lock before returning. Callers must re-check their
    /// condition since wakeups may be spurious.
    pub fn wait<'a, T>(&self, guard: SleepLockGuard<'a, T>) -> SleepLockGuard<'a, T> {
        self.0.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    /// Wakes up all threads sleeping on this condition variable.
    pub fn notify(&self) {
        self.0.notify_all();
    }
}
