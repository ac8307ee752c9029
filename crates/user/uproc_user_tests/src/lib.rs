//! User programs exercising the process and file system calls.
//!
//! Every program is an ordinary function registered under a `.coff` name by
//! [`programs`]. Programs report progress on console output and signal
//! failure through their exit status, like the C test programs of the
//! teaching OS they mirror.

use uproc_kernel::{
    Kernel, KernelConfig, KernelError, Outcome, ProgramImage, ProgramTable, UserEnv,
};

pub mod file;
pub mod process;

/// Prints a line to console output from a user program.
#[macro_export]
macro_rules! uprintln {
    ($env:expr, $($msg:tt)*) => {
        $env.print(&::std::format!("{}\n", ::std::format_args!($($msg)*)))
    };
}

/// Counts a failed expectation and reports it on console output.
pub(crate) fn expect(env: &mut UserEnv, failures: &mut i32, what: &str, ok: bool) {
    if !ok {
        uprintln!(env, "FAILED: {what}");
        *failures += 1;
    }
}

/// Prints the verdict of a self-checking program and returns its exit status.
pub(crate) fn report(env: &mut UserEnv, name: &str, failures: i32) -> i32 {
    if failures == 0 {
        uprintln!(env, "{name}: PASSED");
    } else {
        uprintln!(env, "{name}: {failures} check(s) FAILED");
    }
    failures
}

/// Ten bytes written and read back by `roundtrip.coff`.
pub const ROUNDTRIP_DATA: &[u8; 10] = b"0123456789";

/// The line `readconsole.coff` expects on console input.
pub const CONSOLE_LINE: &[u8; 19] = b"CSS ROCKS MY SOCKS\n";

pub const POEM: &str = "\nroses are red\nviolets are blue\nI love Nachos\nand so do you\n\n";

/// Number of times `writetofile.coff` writes [`POEM`].
pub const POEM_REPEAT: usize = 500;

/// Size of `garbage.txt` as seeded by [`seed_files`].
pub const GARBAGE_LEN: usize = 34239;

/// Registers every test program.
#[must_use]
pub fn programs() -> ProgramTable {
    let mut table = ProgramTable::new()
        .with("joinsw1.coff", process::join_sw)
        .with("swap4.coff", process::swap4)
        .with("write10.coff", process::write10)
        .with("scenario.coff", process::scenario)
        .with("exit.coff", process::exit_with)
        .with("echo.coff", process::echo)
        .with("joinerrors.coff", process::join_errors)
        .with("orphan.coff", process::orphan)
        .with("nonparent.coff", process::non_parent)
        .with("joinother.coff", process::join_other)
        .with("fault.coff", process::fault)
        .with("panic.coff", process::panic)
        .with("joinfaults.coff", process::join_faults)
        .with("execerrors.coff", process::exec_errors)
        .with("halt.coff", process::halt)
        .with("halttry.coff", process::halt_try)
        .with("haltchild.coff", process::halt_child)
        .with("unknown.coff", process::unknown_syscall)
        .with("sleeper.coff", process::sleeper)
        .with("roundtrip.coff", file::roundtrip)
        .with("readconsole.coff", file::read_console)
        .with("readtest1.coff", file::read_one)
        .with("readtest3.coff", file::read_until_eof)
        .with("readbadbuf.coff", file::read_bad_buf)
        .with("readinvalidlength.coff", file::read_invalid_fd)
        .with("writetest1.coff", file::write_console)
        .with("writetofile.coff", file::write_to_file)
        .with("fdexhaust.coff", file::fd_exhaust)
        .with("fderrors.coff", file::fd_errors)
        .with("unlink.coff", file::unlink)
        .with("unlinkopen.coff", file::unlink_open)
        .with("creat.coff", file::creat_truncates)
        .with("stdclose.coff", file::close_standard_streams);
    // a process whose data segment cannot hold a scratch page
    table.insert(
        "tiny.coff",
        ProgramImage::new(process::tiny).data_pages(1),
    );
    table
}

/// Boots a kernel loaded with [`programs`].
///
/// The log level comes from `UPROC_LOG`, so a failing test can be rerun
/// with kernel tracing.
#[must_use]
pub fn boot() -> Kernel {
    boot_with(KernelConfig::default())
}

#[must_use]
pub fn boot_with(config: KernelConfig) -> Kernel {
    Kernel::new(&config, programs())
}

/// Seeds the files the read tests expect.
///
/// # Errors
///
/// Fails if the file store cannot hold the files.
pub fn seed_files(kernel: &Kernel) -> Result<(), KernelError> {
    let garbage = (0..GARBAGE_LEN)
        .map(|i| b"garbage\n"[i % 8])
        .collect::<Vec<_>>();
    kernel.fs().insert("garbage.txt", &garbage)?;
    kernel
        .fs()
        .insert("verylongfile.txt", POEM.repeat(4).as_bytes())?;
    Ok(())
}

/// Runs `path` as the root process and collects console output.
///
/// # Errors
///
/// Fails if the root process cannot be started.
pub fn run(kernel: &Kernel, path: &str, args: &[&str]) -> Result<(Outcome, String), KernelError> {
    let outcome = kernel.run(path, args)?;
    let output = kernel.console().take_output();
    Ok((outcome, String::from_utf8_lossy(&output).into_owned()))
}
