use std::sync::Arc;

use uproc_syscall::syscall;

use super::SyscallExt;
use crate::{
    kernel::KernelCore,
    proc::{Proc, ProcPrivateData, ops},
};

impl SyscallExt for syscall::Halt {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        p: &Proc,
        _private: &mut ProcPrivateData,
        (): Self::Arg,
    ) -> Self::Return {
        let never = ops::halt(core, p)?;
        match never {}
    }
}
