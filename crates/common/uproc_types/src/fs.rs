use core::fmt;

/// A per-process file descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct RawFd(usize);

impl fmt::Display for RawFd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<RawFd> for usize {
    fn from(value: RawFd) -> Self {
        value.0
    }
}

impl From<usize> for RawFd {
    fn from(value: usize) -> Self {
        Self(value)
    }
}

impl RawFd {
    /// Console input, opened in every process at creation.
    pub const STDIN: Self = Self(0);
    /// Console output, opened in every process at creation.
    pub const STDOUT: Self = Self(1);

    #[must_use]
    pub const fn new(value: usize) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn get(self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_streams() {
        assert_eq!(RawFd::STDIN.get(), 0);
        assert_eq!(usize::from(RawFd::STDOUT), 1);
        assert_eq!(RawFd::STDOUT.to_string(), "1");
    }
}
