use uproc_syscall::{RegisterDecodeError, error::SyscallError};
use uproc_types::{fs::RawFd, process::ProcId};

#[derive(Debug, thiserror::Error)]
pub enum KernelError {
    #[error("file descriptor {0} is out of range")]
    FileDescriptorOutOfRange(RawFd),
    #[error("file descriptor {0} is not open")]
    FileDescriptorNotOpen(RawFd),
    #[error("file is not open for reading")]
    NotReadable,
    #[error("file is not open for writing")]
    NotWritable,
    #[error("too many open files")]
    TooManyOpenFiles,
    #[error("too many processes")]
    TooManyProcesses,
    #[error("process not found: {0}")]
    ProcessNotFound(ProcId),
    #[error("process {0} is not a child of the caller")]
    NotChild(ProcId),
    #[error("bad user address: {addr:#x} (+{len:#x})")]
    BadAddress { addr: usize, len: usize },
    #[error("user string is not terminated within the length limit")]
    UnterminatedString,
    #[error("user string is empty")]
    EmptyString,
    #[error("user string is not valid UTF-8")]
    NonUtf8String,
    #[error("invalid file name")]
    InvalidFileName,
    #[error("file system entry not found")]
    FsEntryNotFound,
    #[error("storage full")]
    StorageFull,
    #[error("executable not found")]
    ExecutableNotFound,
    #[error("not an executable")]
    ExecFormat,
    #[error("argument list too long")]
    ArgumentListTooLong,
    #[error("failed to spawn process thread")]
    SpawnFailed,
    #[error("halt is only permitted to the root process")]
    HaltNotPermitted,
    #[error("the machine is halted")]
    Halted,
    #[error("a root process was already spawned")]
    RootAlreadySpawned,
    #[error("invalid system call argument: {0}")]
    RegisterDecode(#[from] RegisterDecodeError),
}

impl From<KernelError> for SyscallError {
    fn from(error: KernelError) -> Self {
        match error {
            KernelError::FileDescriptorOutOfRange(_)
            | KernelError::FileDescriptorNotOpen(_)
            | KernelError::NotReadable
            | KernelError::NotWritable => Self::BadFileDescriptor,
            KernelError::TooManyOpenFiles => Self::TooManyOpenFiles,
            KernelError::TooManyProcesses | KernelError::SpawnFailed => {
                Self::ResourceTemporarilyUnavailable
            }
            KernelError::ProcessNotFound(_) => Self::ProcessNotFound,
            KernelError::NotChild(_) => Self::NoChildProcess,
            KernelError::BadAddress { .. } => Self::BadAddress,
            KernelError::UnterminatedString
            | KernelError::EmptyString
            | KernelError::NonUtf8String
            | KernelError::RegisterDecode(_) => Self::InvalidInput,
            KernelError::InvalidFileName => Self::InvalidFilename,
            KernelError::FsEntryNotFound | KernelError::ExecutableNotFound => {
                Self::FsEntryNotFound
            }
            KernelError::StorageFull => Self::StorageFull,
            KernelError::ExecFormat => Self::ExecFormat,
            KernelError::ArgumentListTooLong => Self::ArgumentListTooLong,
            KernelError::HaltNotPermitted | KernelError::RootAlreadySpawned => Self::NotPermitted,
            KernelError::Halted => Self::Io,
        }
    }
}
