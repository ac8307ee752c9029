use std::sync::Arc;

use uproc_types::process::ProcId;

use crate::{
    config::KernelConfig,
    console::Console,
    error::KernelError,
    fs::KernelFs,
    logger,
    proc::{Outcome, ProcInfo, ProcTable, loader::ProgramLoader, ops},
};

/// State shared by every process thread of a kernel.
pub(crate) struct KernelCore {
    pub(crate) procs: ProcTable,
    pub(crate) fs: KernelFs,
    pub(crate) console: Console,
    pub(crate) loader: Box<dyn ProgramLoader>,
}

/// A booted kernel.
pub struct Kernel {
    core: Arc<KernelCore>,
}

impl Kernel {
    pub fn new<L>(config: &KernelConfig, loader: L) -> Self
    where
        L: ProgramLoader + 'static,
    {
        logger::init(config.log_level);
        log::debug!("boot: {config:?}");
        Self {
            core: Arc::new(KernelCore {
                procs: ProcTable::new(),
                fs: KernelFs::new(config.fs_capacity),
                console: Console::new(config.echo_console),
                loader: Box::new(loader),
            }),
        }
    }

    /// The backing store, for the host to seed and inspect files.
    #[must_use]
    pub fn fs(&self) -> &KernelFs {
        &self.core.fs
    }

    #[must_use]
    pub fn console(&self) -> &Console {
        &self.core.console
    }

    /// Starts the root process.
    pub fn spawn_root(&self, path: &str, args: &[&str]) -> Result<ProcId, KernelError> {
        let args = args.iter().map(|&a| a.to_owned()).collect();
        ops::spawn(&self.core, None, path, args)
    }

    /// Waits until the machine halts or every process has terminated.
    ///
    /// Returns `None` if no root process was spawned.
    #[must_use]
    pub fn wait(&self) -> Option<Outcome> {
        let outcome = self.core.procs.wait()?;
        match outcome {
            Outcome::Halted => log::info!("machine halted"),
            Outcome::Terminated(t) => log::info!("all processes finished; root {t}"),
        }
        Some(outcome)
    }

    /// Spawns the root process and waits for the machine to stop.
    pub fn run(&self, path: &str, args: &[&str]) -> Result<Outcome, KernelError> {
        let pid = self.spawn_root(path, args)?;
        let Some(outcome) = self.wait() else {
            unreachable!("root process {pid} is registered");
        };
        Ok(outcome)
    }

    /// Lists running and zombie processes.
    #[must_use]
    pub fn processes(&self) -> Vec<ProcInfo> {
        self.core.procs.snapshot()
    }
}
