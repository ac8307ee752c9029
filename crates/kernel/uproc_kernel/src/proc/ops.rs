use std::{
    any::Any,
    convert::Infallible,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
    thread,
};

use uproc_kernel_params::{EXEC_SUFFIX, MAX_ARG};
use uproc_types::process::ProcId;

use super::{
    Proc, ProcPrivateData, Termination,
    loader::{self, Program},
};
use crate::{
    error::KernelError,
    kernel::KernelCore,
    user::{UserEnv, UserFault},
};

/// Unwind payload of a process that called `exit`.
struct ExitUnwind;

/// Unwind payload of a process stopped by `halt`.
struct HaltUnwind;

/// Creates a process running the executable `path`.
///
/// The new process starts running on its own thread before this returns;
/// the caller never waits for it.
pub(crate) fn spawn(
    core: &Arc<KernelCore>,
    parent: Option<ProcId>,
    path: &str,
    args: Vec<String>,
) -> Result<ProcId, KernelError> {
    if !path.ends_with(EXEC_SUFFIX) {
        return Err(KernelError::ExecFormat);
    }
    if args.len() > MAX_ARG {
        return Err(KernelError::ArgumentListTooLong);
    }

    let image = core.loader.load(path)?;
    let mut memory = image.create_memory();
    let argv = loader::push_args(&mut memory, &args)?;
    let argc = args.len();

    let p = core.procs.allocate(path, parent)?;
    let pid = p.pid();
    let private = ProcPrivateData::new(memory);
    let program = Arc::clone(image.program());
    let thread_core = Arc::clone(core);
    let spawned = thread::Builder::new()
        .name(format!("{}({pid})", p.name()))
        .spawn(move || run(&thread_core, p, private, &*program, argc, argv));
    if let Err(e) = spawned {
        log::error!("exec {path}: cannot start process thread: {e}");
        core.procs.discard(pid);
        return Err(KernelError::SpawnFailed);
    }

    match parent {
        Some(ppid) => log::debug!("exec {path} as {pid} (parent {ppid}), args {args:?}"),
        None => log::debug!("exec {path} as {pid} (root), args {args:?}"),
    }
    Ok(pid)
}

fn describe_payload(payload: &(dyn Any + Send)) -> String {
    if let Some(fault) = payload.downcast_ref::<UserFault>() {
        fault.to_string()
    } else if let Some(msg) = payload.downcast_ref::<&str>() {
        format!("panicked: {msg}")
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        format!("panicked: {msg}")
    } else {
        "panicked".to_owned()
    }
}

/// Body of a process thread.
fn run(
    core: &Arc<KernelCore>,
    p: Arc<Proc>,
    private: ProcPrivateData,
    program: &dyn Program,
    argc: usize,
    argv: usize,
) {
    let mut env = UserEnv::new(Arc::clone(core), p, private);
    let res = panic::catch_unwind(AssertUnwindSafe(|| -> Infallible {
        let status = program.main(&mut env, argc, argv);
        env.exit(status)
    }));
    let Err(payload) = res;

    if payload.is::<ExitUnwind>() {
        return;
    }
    if payload.is::<HaltUnwind>() {
        log::debug!("{}({}): stopped by halt", env.proc.name(), env.proc.pid());
        env.private.ofile_mut().close_all();
        return;
    }

    log::warn!(
        "{}({}): unhandled exception: {}",
        env.proc.name(),
        env.proc.pid(),
        describe_payload(&*payload)
    );
    finish(core, &env.proc, &mut env.private, Termination::faulted());
}

/// Releases the process's files and turns it into a zombie.
fn finish(core: &KernelCore, p: &Proc, private: &mut ProcPrivateData, termination: Termination) {
    if private.has_exited() {
        return;
    }
    private.mark_exited();
    private.ofile_mut().close_all();
    if core.procs.terminate(p.pid(), termination) {
        log::debug!("{}({}): zombie, {termination}", p.name(), p.pid());
    }
}

/// Exits the current process.
///
/// Does not return. The process stays a zombie until its parent joins it.
pub(crate) fn exit(core: &KernelCore, p: &Proc, private: &mut ProcPrivateData, status: i32) -> ! {
    finish(core, p, private, Termination::exited(status));
    stop_exited()
}

/// Unwinds the current process thread because the process has exited.
pub(crate) fn stop_exited() -> ! {
    panic::resume_unwind(Box::new(ExitUnwind))
}

/// Waits for the child `pid` to terminate and reaps it.
pub(crate) fn join(core: &KernelCore, p: &Proc, pid: ProcId) -> Result<Termination, KernelError> {
    let termination = core.procs.join(p, pid)?;
    log::debug!("{}({}): reaped {pid}, {termination}", p.name(), p.pid());
    Ok(termination)
}

/// Halts the machine. Only the root process may do so.
pub(crate) fn halt(core: &KernelCore, p: &Proc) -> Result<Infallible, KernelError> {
    if core.procs.root() != Some(p.pid()) {
        return Err(KernelError::HaltNotPermitted);
    }
    log::info!("{}({}): halt", p.name(), p.pid());
    core.procs.halt();
    core.console.close_input();
    stop_halted()
}

/// Unwinds the current process thread because the machine is halted.
pub(crate) fn stop_halted() -> ! {
    panic::resume_unwind(Box::new(HaltUnwind))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        console::Console,
        fs::KernelFs,
        proc::{ProcState, ProcTable, loader::ProgramTable},
    };

    fn boot_env() -> (Arc<KernelCore>, UserEnv) {
        let noop = |_: &mut UserEnv, _: usize, _: usize| 0;
        let core = Arc::new(KernelCore {
            procs: ProcTable::new(),
            fs: KernelFs::new(4096),
            console: Console::new(false),
            loader: Box::new(ProgramTable::new().with("child.coff", noop)),
        });
        let p = core.procs.allocate("root.coff", None).unwrap();
        let memory = loader::ProgramImage::new(noop).create_memory();
        let env = UserEnv::new(Arc::clone(&core), p, ProcPrivateData::new(memory));
        (core, env)
    }

    fn unwinds_with_exit<F>(f: F) -> bool
    where
        F: FnOnce(),
    {
        panic::catch_unwind(AssertUnwindSafe(f))
            .is_err_and(|payload| payload.is::<ExitUnwind>())
    }

    #[test]
    fn exited_process_gets_no_more_service() {
        let (core, mut env) = boot_env();
        assert!(unwinds_with_exit(|| env.exit(3)));

        assert!(unwinds_with_exit(|| {
            env.open_file("late.txt");
        }));
        assert!(!core.fs.exists("late.txt"));

        assert!(unwinds_with_exit(|| {
            env.exec_args("child.coff", &["child.coff"]);
        }));
        assert!(unwinds_with_exit(|| env.exit(7)));

        let procs = core.procs.snapshot();
        assert_eq!(procs.len(), 1, "{procs:?}");
        assert_eq!(procs[0].state, ProcState::Zombie(Termination::exited(3)));
    }

    #[test]
    fn fault_after_exit_keeps_exit_status() {
        let (core, mut env) = boot_env();
        assert!(unwinds_with_exit(|| env.exit(5)));
        finish(&core, &env.proc, &mut env.private, Termination::faulted());
        let procs = core.procs.snapshot();
        assert_eq!(procs[0].state, ProcState::Zombie(Termination::exited(5)));
    }

    #[test]
    fn exit_closes_open_files() {
        let (core, mut env) = boot_env();
        let fd = env.creat_file("open.txt");
        assert!(fd >= 2);
        assert_eq!(env.private.ofile().open_count(), 3);
        assert!(unwinds_with_exit(|| env.exit(0)));
        assert_eq!(env.private.ofile().open_count(), 0);
        assert!(core.fs.exists("open.txt"));
    }
}
