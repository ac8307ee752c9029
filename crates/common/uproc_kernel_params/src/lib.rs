#![no_std]

/// Maximum number of processes (running or zombie) at once.
pub const NPROC: usize = 64;

/// Open files per process, including the two standard streams.
pub const NOFILE: usize = 16;

/// Size of a user memory page in bytes.
pub const PAGE_SIZE: usize = 0x400;

/// User stack pages.
pub const STACK_PAGES: usize = 8;

/// Maximum length of a user string, including the terminating NUL.
pub const MAX_STRING_LENGTH: usize = 256;

/// Maximum number of `exec` arguments.
pub const MAX_ARG: usize = 32;

/// Size in bytes of a user pointer stored in user memory (`argv` entries).
pub const USER_PTR_SIZE: usize = 4;

/// Required suffix of executable file names.
pub const EXEC_SUFFIX: &str = ".coff";

/// Maximum length of a process name (for debugging).
pub const PROC_NAME_LEN: usize = 16;
