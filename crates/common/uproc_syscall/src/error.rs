use strum::FromRepr;

/// Error codes returned to user programs.
///
/// A failed system call returns the negated code. Only the sign of the return
/// value is part of the ABI contract; the numbering follows errno so that
/// traces stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, thiserror::Error)]
#[repr(isize)]
pub enum SyscallError {
    // EPERM
    #[error("operation not permitted")]
    NotPermitted = 1,
    // ENOENT
    #[error("no such file or directory")]
    FsEntryNotFound = 2,
    // ESRCH
    #[error("no such process")]
    ProcessNotFound = 3,
    // EIO
    #[error("input/output error")]
    Io = 5,
    // E2BIG
    #[error("argument list too long")]
    ArgumentListTooLong = 7,
    // ENOEXEC
    #[error("exec format error")]
    ExecFormat = 8,
    // EBADF
    #[error("bad file descriptor")]
    BadFileDescriptor = 9,
    // ECHILD
    #[error("no child process")]
    NoChildProcess = 10,
    // EAGAIN
    #[error("resource temporarily unavailable")]
    ResourceTemporarilyUnavailable = 11,
    // ENOMEM
    #[error("cannot allocate memory")]
    OutOfMemory = 12,
    // EFAULT
    #[error("bad address")]
    BadAddress = 14,
    // EINVAL
    #[error("invalid argument")]
    InvalidInput = 22,
    // EMFILE
    #[error("too many open files")]
    TooManyOpenFiles = 24,
    // ENOSPC
    #[error("no space left on device")]
    StorageFull = 28,
    // ENAMETOOLONG
    #[error("file name too long")]
    InvalidFilename = 36,
    // ENOSYS
    #[error("function not implemented")]
    FunctionNotImplemented = 38,
}

impl SyscallError {
    /// Returns the (negative) value a failed system call returns.
    #[must_use]
    pub const fn to_return_value(self) -> isize {
        -(self as isize)
    }

    /// Decodes a negative system call return value.
    #[must_use]
    pub fn from_return_value(value: isize) -> Option<Self> {
        Self::from_repr(value.checked_neg()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_values_are_negative() {
        for err in [
            SyscallError::NotPermitted,
            SyscallError::BadFileDescriptor,
            SyscallError::TooManyOpenFiles,
            SyscallError::FunctionNotImplemented,
        ] {
            let ret = err.to_return_value();
            assert!(ret < 0);
            assert_eq!(SyscallError::from_return_value(ret), Some(err));
        }
        assert_eq!(SyscallError::from_return_value(0), None);
        assert_eq!(SyscallError::from_return_value(isize::MIN), None);
    }
}
