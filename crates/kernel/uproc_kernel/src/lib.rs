//! Process lifecycle and per-process file descriptors of a teaching kernel.
//!
//! User programs are ordinary Rust closures that run on their own host
//! thread against a private, paged address space. They enter the kernel only
//! through [`UserEnv::syscall`], which decodes the trap frame and dispatches
//! to the system call handlers:
//!
//! - process control: `halt`, `exit`, `exec`, `join`
//! - files: `creat`, `open`, `read`, `write`, `close`, `unlink`
//!
//! Every process starts with console input on descriptor 0 and console
//! output on descriptor 1. Regular files live in an in-memory store owned by
//! the [`Kernel`].

pub mod config;
pub mod console;
pub mod error;
pub mod file;
pub mod fs;
mod kernel;
pub mod logger;
pub mod memory;
pub mod proc;
mod sync;
pub mod syscall;
pub mod user;

pub use self::{
    config::KernelConfig,
    error::KernelError,
    kernel::Kernel,
    proc::{
        Outcome, ProcInfo, ProcState, Termination, TerminationCause,
        loader::{Program, ProgramImage, ProgramLoader, ProgramTable},
    },
    user::{UserEnv, UserFault},
};
