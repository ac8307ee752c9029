//! System call dispatch.

use std::{convert::Infallible, fmt, sync::Arc};

use uproc_syscall::{
    Register, RegisterDecodeError, RegisterValue, Syscall, SyscallCode, error::SyscallError,
    syscall,
};

use crate::{
    error::KernelError,
    kernel::KernelCore,
    proc::{Proc, ProcPrivateData, ops},
};

mod file;
mod proc;
mod system;

/// Registers of a trapping user program.
///
/// `a7` holds the system call number, `a0..=a3` the arguments. The return
/// value is stored into `a0`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TrapFrame {
    pub a0: usize,
    pub a1: usize,
    pub a2: usize,
    pub a3: usize,
    pub a7: usize,
}

trait Arg: Sized {
    type Target;
    type DecodeError: fmt::Debug;
    fn decode_arg(tf: &TrapFrame) -> Result<Self::Target, Self::DecodeError>;
}

impl<T> Arg for Register<T, 0>
where
    T: RegisterValue<Repr = Self>,
{
    type DecodeError = T::DecodeError;
    type Target = T;

    fn decode_arg(_tf: &TrapFrame) -> Result<Self::Target, Self::DecodeError> {
        Self::new([]).try_decode()
    }
}

impl<T> Arg for Register<T, 1>
where
    T: RegisterValue<Repr = Self>,
{
    type DecodeError = T::DecodeError;
    type Target = T;

    fn decode_arg(tf: &TrapFrame) -> Result<Self::Target, Self::DecodeError> {
        Self::new([tf.a0]).try_decode()
    }
}

impl<T> Arg for Register<T, 2>
where
    T: RegisterValue<Repr = Self>,
{
    type DecodeError = T::DecodeError;
    type Target = T;

    fn decode_arg(tf: &TrapFrame) -> Result<Self::Target, Self::DecodeError> {
        Self::new([tf.a0, tf.a1]).try_decode()
    }
}

impl<T> Arg for Register<T, 3>
where
    T: RegisterValue<Repr = Self>,
{
    type DecodeError = T::DecodeError;
    type Target = T;

    fn decode_arg(tf: &TrapFrame) -> Result<Self::Target, Self::DecodeError> {
        Self::new([tf.a0, tf.a1, tf.a2]).try_decode()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnValue {
    Ret0,
    Ret1(usize),
}

impl<T> From<Register<T, 0>> for ReturnValue {
    fn from(_: Register<T, 0>) -> Self {
        Self::Ret0
    }
}

impl<T> From<Register<T, 1>> for ReturnValue {
    fn from(value: Register<T, 1>) -> Self {
        let [a0] = value.a;
        Self::Ret1(a0)
    }
}

impl ReturnValue {
    pub fn store(self, tf: &mut TrapFrame) {
        match self {
            Self::Ret0 => {}
            Self::Ret1(a0) => tf.a0 = a0,
        }
    }
}

trait IntoReturn<T> {
    fn into_return(self) -> T;
}

impl<T> IntoReturn<T> for Infallible {
    fn into_return(self) -> T {
        match self {}
    }
}

impl<T> IntoReturn<Result<T, SyscallError>> for RegisterDecodeError {
    fn into_return(self) -> Result<T, SyscallError> {
        Err(KernelError::from(self).into())
    }
}

trait SyscallExt: Syscall {
    type KernelArg: RegisterValue + fmt::Debug;
    type KernelReturn: RegisterValue + fmt::Debug;

    fn handle(
        core: &Arc<KernelCore>,
        p: &Proc,
        private: &mut ProcPrivateData,
        tf: &TrapFrame,
    ) -> ReturnValue
    where
        <Self::KernelArg as RegisterValue>::Repr: Arg<Target = Self::KernelArg>,
        <<Self::KernelArg as RegisterValue>::Repr as Arg>::DecodeError:
            IntoReturn<Self::KernelReturn>,
        <Self::KernelReturn as RegisterValue>::Repr: Into<ReturnValue>,
    {
        let arg = <Self::KernelArg as RegisterValue>::Repr::decode_arg(tf);
        let ret = match arg {
            Ok(arg) => {
                let arg_text =
                    log::log_enabled!(log::Level::Trace).then(|| format!("{arg:?}"));
                let ret = Self::call(core, p, private, arg);
                if let Some(arg_text) = arg_text {
                    log::trace!(
                        "{}({}): syscall {} {arg_text} -> {ret:?}",
                        p.name(),
                        p.pid(),
                        Self::CODE
                    );
                }
                ret
            }
            Err(e) => {
                log::debug!(
                    "{}({}): syscall {}: bad argument: {e:?}",
                    p.name(),
                    p.pid(),
                    Self::CODE
                );
                e.into_return()
            }
        };
        ret.encode().into()
    }

    fn call(
        core: &Arc<KernelCore>,
        p: &Proc,
        private: &mut ProcPrivateData,
        arg: Self::KernelArg,
    ) -> Self::KernelReturn;
}

/// Handles the system call held in `tf` on behalf of `p`.
///
/// Once the machine is halted, every process thread that enters or leaves
/// the kernel is unwound instead. So is a process that has already exited.
pub(crate) fn syscall(
    core: &Arc<KernelCore>,
    p: &Proc,
    private: &mut ProcPrivateData,
    tf: &mut TrapFrame,
) {
    if core.procs.is_halted() {
        ops::stop_halted();
    }
    if private.has_exited() {
        log::warn!("{}({}): syscall after exit", p.name(), p.pid());
        ops::stop_exited();
    }

    let n = tf.a7;
    let Some(ty) = SyscallCode::from_repr(n) else {
        log::warn!("{}({}): unknown syscall {n}", p.name(), p.pid());
        let ret: Result<(), SyscallError> = Err(SyscallError::FunctionNotImplemented);
        ReturnValue::from(ret.encode()).store(tf);
        return;
    };

    let ret = match ty {
        SyscallCode::Halt => syscall::Halt::handle(core, p, private, tf),
        SyscallCode::Exit => syscall::Exit::handle(core, p, private, tf),
        SyscallCode::Exec => syscall::Exec::handle(core, p, private, tf),
        SyscallCode::Join => syscall::Join::handle(core, p, private, tf),
        SyscallCode::Creat => syscall::Creat::handle(core, p, private, tf),
        SyscallCode::Open => syscall::Open::handle(core, p, private, tf),
        SyscallCode::Read => syscall::Read::handle(core, p, private, tf),
        SyscallCode::Write => syscall::Write::handle(core, p, private, tf),
        SyscallCode::Close => syscall::Close::handle(core, p, private, tf),
        SyscallCode::Unlink => syscall::Unlink::handle(core, p, private, tf),
    };

    if core.procs.is_halted() {
        ops::stop_halted();
    }
    ret.store(tf);
}
