//! Lock abstraction shared by kernel components.
//!
//! Components that hold shared state (such as the in-memory file store) are
//! generic over this trait so that they can be driven by the kernel's own
//! lock type or by a plain standard library mutex in tests.
#![cfg_attr(not(feature = "std"), no_std)]

use core::ops::DerefMut;

/// A mutual exclusion lock.
pub trait Mutex {
    /// The protected data.
    type Data;

    /// The guard returned by [`Mutex::lock`].
    type Guard<'a>: DerefMut<Target = Self::Data>
    where
        Self: 'a;

    fn new(data: Self::Data) -> Self;

    /// Acquires the lock, blocking the caller until it is available.
    ///
    /// A lock whose previous holder unwound while holding it is still
    /// acquired; the data is handed out as the holder left it.
    fn lock(&self) -> Self::Guard<'_>;

    /// Returns the protected data without locking.
    fn get_mut(&mut self) -> &mut Self::Data;
}

#[cfg(feature = "std")]
impl<T> Mutex for std::sync::Mutex<T> {
    type Data = T;
    type Guard<'a>
        = std::sync::MutexGuard<'a, T>
    where
        T: 'a;

    fn new(data: Self::Data) -> Self {
        Self::new(data)
    }

    fn lock(&self) -> Self::Guard<'_> {
        self.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn get_mut(&mut self) -> &mut Self::Data {
        self.get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
