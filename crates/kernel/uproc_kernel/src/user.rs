//! The view a user program has of the machine.
//!
//! A program touches its memory only through the load and store helpers and
//! enters the kernel only through [`UserEnv::syscall`]. The typed wrappers
//! follow the C library signatures of the teaching OS: every argument and
//! return value is a plain integer, pointers are user addresses.

use std::{panic, sync::Arc};

use uproc_kernel_params::{PAGE_SIZE, USER_PTR_SIZE};
use uproc_syscall::SyscallCode;

use crate::{
    kernel::KernelCore,
    proc::{Proc, ProcPrivateData},
    syscall::{self, TrapFrame},
};

/// An exception raised by a user program.
///
/// Unwinding a process thread with this payload terminates the process
/// abnormally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum UserFault {
    #[error("bad memory access at {addr:#x} (+{len:#x})")]
    BadAddress { addr: usize, len: usize },
    #[error("user heap exhausted")]
    OutOfMemory,
}

pub struct UserEnv {
    pub(crate) core: Arc<KernelCore>,
    pub(crate) proc: Arc<Proc>,
    pub(crate) private: ProcPrivateData,
    brk: usize,
    scratch: Option<usize>,
}

const STDOUT: i32 = 1;

#[expect(clippy::cast_possible_truncation)]
const fn to_c_int(ret: isize) -> i32 {
    ret as i32
}

const fn from_c_int(n: i32) -> usize {
    n as isize as usize
}

impl UserEnv {
    pub(crate) fn new(core: Arc<KernelCore>, proc: Arc<Proc>, private: ProcPrivateData) -> Self {
        let brk = private.memory().data_range().start;
        Self {
            core,
            proc,
            private,
            brk,
            scratch: None,
        }
    }

    /// Raises a user exception.
    pub fn fault(fault: UserFault) -> ! {
        panic::resume_unwind(Box::new(fault))
    }

    /// Traps into the kernel.
    ///
    /// `code` is the system call number; the return value is the raw `a0`
    /// register.
    pub fn syscall(&mut self, code: usize, args: [usize; 4]) -> isize {
        let [a0, a1, a2, a3] = args;
        let mut tf = TrapFrame {
            a0,
            a1,
            a2,
            a3,
            a7: code,
        };
        syscall::syscall(&self.core, &self.proc, &mut self.private, &mut tf);
        tf.a0 as isize
    }

    fn call(&mut self, code: SyscallCode, args: [usize; 4]) -> i32 {
        to_c_int(self.syscall(code as usize, args))
    }

    pub fn load(&self, addr: usize, buf: &mut [u8]) {
        if self.private.memory().load(addr, buf).is_err() {
            Self::fault(UserFault::BadAddress {
                addr,
                len: buf.len(),
            });
        }
    }

    pub fn store(&mut self, addr: usize, bytes: &[u8]) {
        if self.private.memory_mut().store(addr, bytes).is_err() {
            Self::fault(UserFault::BadAddress {
                addr,
                len: bytes.len(),
            });
        }
    }

    #[must_use]
    pub fn load_bytes(&self, addr: usize, len: usize) -> Vec<u8> {
        let mut buf = vec![0; len];
        self.load(addr, &mut buf);
        buf
    }

    #[must_use]
    pub fn load_i32(&self, addr: usize) -> i32 {
        let mut buf = [0; 4];
        self.load(addr, &mut buf);
        i32::from_le_bytes(buf)
    }

    pub fn store_i32(&mut self, addr: usize, value: i32) {
        self.store(addr, &value.to_le_bytes());
    }

    /// Reads a NUL-terminated string.
    #[must_use]
    pub fn load_cstr(&self, mut addr: usize) -> String {
        let mut bytes = vec![];
        loop {
            let mut b = [0];
            self.load(addr, &mut b);
            if b[0] == 0 {
                break;
            }
            bytes.push(b[0]);
            addr += 1;
        }
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Returns `argv[i]`.
    #[must_use]
    pub fn arg(&self, argv: usize, i: usize) -> String {
        let mut ptr = [0; USER_PTR_SIZE];
        self.load(argv + i * USER_PTR_SIZE, &mut ptr);
        self.load_cstr(u32::from_le_bytes(ptr) as usize)
    }

    #[must_use]
    pub fn args(&self, argc: usize, argv: usize) -> Vec<String> {
        (0..argc).map(|i| self.arg(argv, i)).collect()
    }

    /// Allocates `len` zeroed bytes from the data segment.
    ///
    /// Allocations are never freed.
    pub fn alloc(&mut self, len: usize) -> usize {
        let addr = self.brk.next_multiple_of(4);
        let end = addr
            .checked_add(len)
            .filter(|end| *end <= self.private.memory().data_range().end);
        let Some(end) = end else {
            Self::fault(UserFault::OutOfMemory);
        };
        self.brk = end;
        addr
    }

    pub fn alloc_bytes(&mut self, bytes: &[u8]) -> usize {
        let addr = self.alloc(bytes.len());
        self.store(addr, bytes);
        addr
    }

    pub fn alloc_cstr(&mut self, s: &str) -> usize {
        let addr = self.alloc(s.len() + 1);
        self.store(addr, s.as_bytes());
        addr
    }

    /// Builds an `argv` array of `u32` string pointers.
    pub fn alloc_argv(&mut self, args: &[&str]) -> usize {
        let ptrs = args
            .iter()
            .map(|a| self.alloc_cstr(a))
            .collect::<Vec<_>>();
        let argv = self.alloc(ptrs.len() * USER_PTR_SIZE);
        for (i, ptr) in ptrs.into_iter().enumerate() {
            let Ok(ptr) = u32::try_from(ptr) else {
                Self::fault(UserFault::OutOfMemory);
            };
            self.store(argv + i * USER_PTR_SIZE, &ptr.to_le_bytes());
        }
        argv
    }

    /// A page of the data segment reused by the string helpers.
    fn scratch(&mut self) -> usize {
        if let Some(addr) = self.scratch {
            return addr;
        }
        let addr = self.alloc(PAGE_SIZE);
        self.scratch = Some(addr);
        addr
    }

    fn scratch_cstr(&mut self, s: &str) -> usize {
        if s.len() >= PAGE_SIZE {
            return self.alloc_cstr(s);
        }
        let addr = self.scratch();
        self.store(addr, s.as_bytes());
        self.store(addr + s.len(), &[0]);
        addr
    }

    /// Halts the machine. Returns only if the caller is not permitted to.
    pub fn halt(&mut self) -> i32 {
        self.call(SyscallCode::Halt, [0; 4])
    }

    pub fn exit(&mut self, status: i32) -> ! {
        self.syscall(SyscallCode::Exit as usize, [from_c_int(status), 0, 0, 0]);
        unreachable!("exit returned to user mode")
    }

    pub fn exec(&mut self, file: usize, argc: i32, argv: usize) -> i32 {
        self.call(SyscallCode::Exec, [file, from_c_int(argc), argv, 0])
    }

    pub fn join(&mut self, pid: i32, status: usize) -> i32 {
        self.call(SyscallCode::Join, [from_c_int(pid), status, 0, 0])
    }

    pub fn creat(&mut self, name: usize) -> i32 {
        self.call(SyscallCode::Creat, [name, 0, 0, 0])
    }

    pub fn open(&mut self, name: usize) -> i32 {
        self.call(SyscallCode::Open, [name, 0, 0, 0])
    }

    pub fn read(&mut self, fd: i32, buffer: usize, count: i32) -> i32 {
        self.call(
            SyscallCode::Read,
            [from_c_int(fd), buffer, from_c_int(count), 0],
        )
    }

    pub fn write(&mut self, fd: i32, buffer: usize, count: i32) -> i32 {
        self.call(
            SyscallCode::Write,
            [from_c_int(fd), buffer, from_c_int(count), 0],
        )
    }

    pub fn close(&mut self, fd: i32) -> i32 {
        self.call(SyscallCode::Close, [from_c_int(fd), 0, 0, 0])
    }

    pub fn unlink(&mut self, name: usize) -> i32 {
        self.call(SyscallCode::Unlink, [name, 0, 0, 0])
    }

    /// `exec` with the path and arguments copied into user memory.
    pub fn exec_args(&mut self, path: &str, args: &[&str]) -> i32 {
        let file = self.alloc_cstr(path);
        let argv = self.alloc_argv(args);
        let Ok(argc) = i32::try_from(args.len()) else {
            return -1;
        };
        self.exec(file, argc, argv)
    }

    pub fn open_file(&mut self, name: &str) -> i32 {
        let name = self.scratch_cstr(name);
        self.open(name)
    }

    pub fn creat_file(&mut self, name: &str) -> i32 {
        let name = self.scratch_cstr(name);
        self.creat(name)
    }

    pub fn unlink_file(&mut self, name: &str) -> i32 {
        let name = self.scratch_cstr(name);
        self.unlink(name)
    }

    /// Writes `s` to console output.
    pub fn print(&mut self, s: &str) {
        for chunk in s.as_bytes().chunks(PAGE_SIZE) {
            let buf = self.scratch();
            self.store(buf, chunk);
            let Ok(len) = i32::try_from(chunk.len()) else {
                return;
            };
            self.write(STDOUT, buf, len);
        }
    }
}
