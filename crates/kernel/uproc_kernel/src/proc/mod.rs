//! Processes and the process registry.

use std::{collections::BTreeMap, fmt, sync::Arc};

use arrayvec::ArrayString;
use uproc_kernel_params::{NPROC, PROC_NAME_LEN};
use uproc_syscall::JoinStatus;
use uproc_types::process::ProcId;

use crate::{
    error::KernelError,
    file::FileTable,
    memory::UserMemory,
    sync::{SleepLock, SleepLockCondVar},
};

pub mod loader;
pub(crate) mod ops;

/// Status reported by `join` for a process terminated by a fault.
pub const FAULT_EXIT_STATUS: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationCause {
    /// The process called `exit` or returned from `main`.
    Exited,
    /// The process was terminated by an unhandled fault.
    Faulted,
}

/// How a process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Termination {
    pub exit_status: i32,
    pub cause: TerminationCause,
}

impl Termination {
    #[must_use]
    pub const fn exited(exit_status: i32) -> Self {
        Self {
            exit_status,
            cause: TerminationCause::Exited,
        }
    }

    #[must_use]
    pub const fn faulted() -> Self {
        Self {
            exit_status: FAULT_EXIT_STATUS,
            cause: TerminationCause::Faulted,
        }
    }

    #[must_use]
    pub const fn is_abnormal(self) -> bool {
        matches!(self.cause, TerminationCause::Faulted)
    }

    #[must_use]
    pub const fn join_status(self) -> JoinStatus {
        match self.cause {
            TerminationCause::Exited => JoinStatus::Exited,
            TerminationCause::Faulted => JoinStatus::Faulted,
        }
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.cause {
            TerminationCause::Exited => write!(f, "exited with status {}", self.exit_status),
            TerminationCause::Faulted => f.write_str("terminated by fault"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcState {
    Running,
    Zombie(Termination),
}

/// Per-process state visible to other processes.
pub struct Proc {
    pid: ProcId,
    name: ArrayString<PROC_NAME_LEN>,
    /// Notified when a child of this process terminates.
    child_ended: SleepLockCondVar,
}

impl fmt::Debug for Proc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Proc")
            .field("pid", &self.pid)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

impl Proc {
    fn new(pid: ProcId, name: &str) -> Self {
        let mut short = ArrayString::new();
        for ch in name.chars() {
            if short.try_push(ch).is_err() {
                break;
            }
        }
        Self {
            pid,
            name: short,
            child_ended: SleepLockCondVar::new(),
        }
    }

    #[must_use]
    pub fn pid(&self) -> ProcId {
        self.pid
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Per-process state owned by the process's own thread.
///
/// Nothing else in the kernel can reach it, so it needs no lock.
pub struct ProcPrivateData {
    memory: UserMemory,
    ofile: FileTable,
    exited: bool,
}

impl ProcPrivateData {
    #[must_use]
    pub fn new(memory: UserMemory) -> Self {
        Self {
            memory,
            ofile: FileTable::with_standard_streams(),
            exited: false,
        }
    }

    /// Returns `true` once the process has left the running state.
    #[must_use]
    pub fn has_exited(&self) -> bool {
        self.exited
    }

    pub(crate) fn mark_exited(&mut self) {
        self.exited = true;
    }

    #[must_use]
    pub fn memory(&self) -> &UserMemory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut UserMemory {
        &mut self.memory
    }

    #[must_use]
    pub fn ofile(&self) -> &FileTable {
        &self.ofile
    }

    pub fn ofile_mut(&mut self) -> &mut FileTable {
        &mut self.ofile
    }

    /// Borrows the address space and the descriptor table at the same time.
    pub fn split_mut(&mut self) -> (&mut UserMemory, &mut FileTable) {
        (&mut self.memory, &mut self.ofile)
    }
}

struct ProcEntry {
    proc: Arc<Proc>,
    parent: Option<ProcId>,
    state: ProcState,
}

struct ProcTableData {
    next_pid: Option<ProcId>,
    procs: BTreeMap<ProcId, ProcEntry>,
    root: Option<ProcId>,
    root_termination: Option<Termination>,
    running: usize,
    halted: bool,
}

/// A registry row, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcInfo {
    pub pid: ProcId,
    pub name: String,
    pub parent: Option<ProcId>,
    pub state: ProcState,
}

/// Why the registry stopped waiting for processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The root process called `halt`.
    Halted,
    /// Every process finished; holds the root process's termination.
    Terminated(Termination),
}

/// Registry of every process that is running or waiting to be reaped.
///
/// All state transitions happen under one lock. A process that waits in
/// `join` sleeps on its own `child_ended` condition variable with that lock
/// released.
pub struct ProcTable {
    data: SleepLock<ProcTableData>,
    all_ended: SleepLockCondVar,
}

impl Default for ProcTable {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: SleepLock::new(ProcTableData {
                next_pid: Some(ProcId::FIRST),
                procs: BTreeMap::new(),
                root: None,
                root_termination: None,
                running: 0,
                halted: false,
            }),
            all_ended: SleepLockCondVar::new(),
        }
    }

    /// Registers a new running process.
    ///
    /// A process without a parent becomes the root process; only one may
    /// exist per registry.
    pub fn allocate(&self, name: &str, parent: Option<ProcId>) -> Result<Arc<Proc>, KernelError> {
        let mut data = self.data.lock();
        if data.halted {
            return Err(KernelError::Halted);
        }
        if parent.is_none() && data.root.is_some() {
            return Err(KernelError::RootAlreadySpawned);
        }
        if data.procs.len() >= NPROC {
            return Err(KernelError::TooManyProcesses);
        }
        let pid = data.next_pid.ok_or(KernelError::TooManyProcesses)?;
        data.next_pid = pid.checked_next();

        let proc = Arc::new(Proc::new(pid, name));
        data.procs.insert(
            pid,
            ProcEntry {
                proc: Arc::clone(&proc),
                parent,
                state: ProcState::Running,
            },
        );
        data.running += 1;
        if parent.is_none() {
            data.root = Some(pid);
        }
        Ok(proc)
    }

    /// Removes a process that never started running.
    pub fn discard(&self, pid: ProcId) {
        let mut data = self.data.lock();
        if data.procs.remove(&pid).is_some() {
            data.running -= 1;
            if data.root == Some(pid) {
                data.root = None;
            }
        }
    }

    /// Turns a running process into a zombie.
    ///
    /// Children of the process lose their parent. The parent, if any, is
    /// woken up. Returns `false` if the process was not running.
    #[must_use]
    pub fn terminate(&self, pid: ProcId, termination: Termination) -> bool {
        let mut data = self.data.lock();
        let Some(entry) = data.procs.get_mut(&pid) else {
            log::error!("terminate: process {pid} is not registered");
            return false;
        };
        if entry.state != ProcState::Running {
            log::error!("terminate: process {pid} already terminated");
            return false;
        }
        entry.state = ProcState::Zombie(termination);
        let parent = entry.parent;

        for child in data.procs.values_mut() {
            if child.parent == Some(pid) {
                child.parent = None;
            }
        }

        if let Some(parent) = parent.and_then(|ppid| data.procs.get(&ppid)) {
            parent.proc.child_ended.notify();
        }

        if data.root == Some(pid) {
            data.root_termination = Some(termination);
        }
        data.running -= 1;
        if data.running == 0 {
            self.all_ended.notify();
        }
        true
    }

    /// Waits for the child `pid` of `caller` to terminate, then reaps it.
    pub fn join(&self, caller: &Proc, pid: ProcId) -> Result<Termination, KernelError> {
        let mut data = self.data.lock();
        loop {
            if data.halted {
                return Err(KernelError::Halted);
            }
            let entry = data
                .procs
                .get(&pid)
                .ok_or(KernelError::ProcessNotFound(pid))?;
            if entry.parent != Some(caller.pid) {
                return Err(KernelError::NotChild(pid));
            }
            if let ProcState::Zombie(termination) = entry.state {
                data.procs.remove(&pid);
                return Ok(termination);
            }
            data = caller.child_ended.wait(data);
        }
    }

    /// Stops the machine, releasing every sleeping joiner.
    pub fn halt(&self) {
        let mut data = self.data.lock();
        data.halted = true;
        for entry in data.procs.values() {
            entry.proc.child_ended.notify();
        }
        drop(data);
        self.all_ended.notify();
    }

    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.data.lock().halted
    }

    #[must_use]
    pub fn root(&self) -> Option<ProcId> {
        self.data.lock().root
    }

    /// Waits until the machine halts or every process has terminated.
    ///
    /// Returns `None` if no root process was ever spawned.
    pub fn wait(&self) -> Option<Outcome> {
        let mut data = self.data.lock();
        loop {
            if data.halted {
                return Some(Outcome::Halted);
            }
            if data.running == 0 {
                return data.root_termination.map(Outcome::Terminated);
            }
            data = self.all_ended.wait(data);
        }
    }

    /// Returns the registry contents ordered by pid.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ProcInfo> {
        let data = self.data.lock();
        data.procs
            .iter()
            .map(|(pid, entry)| ProcInfo {
                pid: *pid,
                name: entry.proc.name().to_owned(),
                parent: entry.parent,
                state: entry.state,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::{thread, time::Duration};

    use super::*;

    #[test]
    fn pids_increase_and_are_not_reused() {
        let table = ProcTable::new();
        let root = table.allocate("root.coff", None).unwrap();
        let c1 = table.allocate("c1.coff", Some(root.pid())).unwrap();
        assert!(table.terminate(c1.pid(), Termination::exited(0)));
        table.join(&root, c1.pid()).unwrap();
        let c2 = table.allocate("c2.coff", Some(root.pid())).unwrap();
        assert_eq!(u32::from(root.pid()), 1);
        assert_eq!(u32::from(c1.pid()), 2);
        assert_eq!(u32::from(c2.pid()), 3);
    }

    #[test]
    fn only_one_root() {
        let table = ProcTable::new();
        table.allocate("root.coff", None).unwrap();
        assert!(matches!(
            table.allocate("other.coff", None),
            Err(KernelError::RootAlreadySpawned)
        ));
    }

    #[test]
    fn process_count_is_bounded() {
        let table = ProcTable::new();
        let root = table.allocate("root.coff", None).unwrap();
        for _ in 1..NPROC {
            table.allocate("child.coff", Some(root.pid())).unwrap();
        }
        assert!(matches!(
            table.allocate("child.coff", Some(root.pid())),
            Err(KernelError::TooManyProcesses)
        ));
    }

    #[test]
    fn join_reaps_exactly_once() {
        let table = ProcTable::new();
        let root = table.allocate("root.coff", None).unwrap();
        let child = table.allocate("child.coff", Some(root.pid())).unwrap();
        assert!(table.terminate(child.pid(), Termination::exited(7)));
        assert_eq!(
            table.join(&root, child.pid()).unwrap(),
            Termination::exited(7)
        );
        assert!(matches!(
            table.join(&root, child.pid()),
            Err(KernelError::ProcessNotFound(_))
        ));
    }

    #[test]
    fn terminate_happens_once() {
        let table = ProcTable::new();
        let root = table.allocate("root.coff", None).unwrap();
        let child = table.allocate("child.coff", Some(root.pid())).unwrap();
        assert!(table.terminate(child.pid(), Termination::exited(3)));
        assert!(!table.terminate(child.pid(), Termination::exited(7)));
        assert_eq!(
            table.join(&root, child.pid()).unwrap(),
            Termination::exited(3)
        );
    }

    #[test]
    fn join_by_non_parent_fails() {
        let table = ProcTable::new();
        let root = table.allocate("root.coff", None).unwrap();
        let a = table.allocate("a.coff", Some(root.pid())).unwrap();
        let b = table.allocate("b.coff", Some(root.pid())).unwrap();
        assert!(matches!(
            table.join(&a, b.pid()),
            Err(KernelError::NotChild(_))
        ));
        assert!(matches!(
            table.join(&a, root.pid()),
            Err(KernelError::NotChild(_))
        ));
        assert!(matches!(
            table.join(&a, a.pid()),
            Err(KernelError::NotChild(_))
        ));
    }

    #[test]
    fn join_sleeps_until_child_terminates() {
        let table = Arc::new(ProcTable::new());
        let root = table.allocate("root.coff", None).unwrap();
        let child = table.allocate("child.coff", Some(root.pid())).unwrap();

        let terminator = {
            let table = Arc::clone(&table);
            let pid = child.pid();
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(20));
                assert!(table.terminate(pid, Termination::faulted()));
            })
        };
        let termination = table.join(&root, child.pid()).unwrap();
        assert!(termination.is_abnormal());
        assert_eq!(termination.join_status(), JoinStatus::Faulted);
        terminator.join().unwrap();
    }

    #[test]
    fn orphans_cannot_be_joined() {
        let table = ProcTable::new();
        let root = table.allocate("root.coff", None).unwrap();
        let parent = table.allocate("parent.coff", Some(root.pid())).unwrap();
        let orphan = table.allocate("orphan.coff", Some(parent.pid())).unwrap();
        assert!(table.terminate(parent.pid(), Termination::exited(0)));
        assert!(table.terminate(orphan.pid(), Termination::exited(0)));
        assert!(matches!(
            table.join(&root, orphan.pid()),
            Err(KernelError::NotChild(_))
        ));
        let info = table.snapshot();
        let orphan_info = info.iter().find(|i| i.pid == orphan.pid()).unwrap();
        assert_eq!(orphan_info.parent, None);
        assert_eq!(
            orphan_info.state,
            ProcState::Zombie(Termination::exited(0))
        );
    }

    #[test]
    fn wait_reports_root_termination() {
        let table = ProcTable::new();
        assert_eq!(table.wait(), None);
        let root = table.allocate("root.coff", None).unwrap();
        let child = table.allocate("child.coff", Some(root.pid())).unwrap();
        assert!(table.terminate(root.pid(), Termination::exited(3)));
        assert!(table.terminate(child.pid(), Termination::exited(0)));
        assert_eq!(
            table.wait(),
            Some(Outcome::Terminated(Termination::exited(3)))
        );
    }

    #[test]
    fn halt_releases_joiners() {
        let table = Arc::new(ProcTable::new());
        let root = table.allocate("root.coff", None).unwrap();
        let child = table.allocate("child.coff", Some(root.pid())).unwrap();
        let joiner = {
            let table = Arc::clone(&table);
            let root = Arc::clone(&root);
            let pid = child.pid();
            thread::spawn(move || table.join(&root, pid))
        };
        thread::sleep(Duration::from_millis(20));
        table.halt();
        assert!(matches!(joiner.join().unwrap(), Err(KernelError::Halted)));
        assert_eq!(table.wait(), Some(Outcome::Halted));
    }
}
