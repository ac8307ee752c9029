use core::{fmt, num::NonZero};

use dataview::Pod;

/// A process identifier.
///
/// Identifiers are never zero and are never reused during the lifetime of a
/// kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct ProcId(NonZero<u32>);

unsafe impl Pod for ProcId {}

impl fmt::Display for ProcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<ProcId> for u32 {
    fn from(value: ProcId) -> Self {
        value.0.get()
    }
}

impl From<ProcId> for NonZero<u32> {
    fn from(value: ProcId) -> Self {
        value.0
    }
}

impl From<NonZero<u32>> for ProcId {
    fn from(value: NonZero<u32>) -> Self {
        Self(value)
    }
}

impl ProcId {
    /// The identifier handed to the first process a kernel creates.
    pub const FIRST: Self = Self(NonZero::<u32>::MIN);

    #[must_use]
    pub const fn new(value: NonZero<u32>) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> NonZero<u32> {
        self.0
    }

    /// Returns the identifier following this one, or `None` on overflow.
    #[must_use]
    pub const fn checked_next(self) -> Option<Self> {
        match self.0.checked_add(1) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }
}
