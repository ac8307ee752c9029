use std::{convert::Infallible, sync::Arc};

use uproc_kernel_params::MAX_ARG;
use uproc_syscall::{Register, RegisterValue, UserCStr, syscall};

use super::SyscallExt;
use crate::{
    error::KernelError,
    kernel::KernelCore,
    memory::Validate as _,
    proc::{Proc, ProcPrivateData, ops},
};

impl SyscallExt for syscall::Exec {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        p: &Proc,
        private: &mut ProcPrivateData,
        (user_path, user_argv): Self::Arg,
    ) -> Self::Return {
        let memory = private.memory();
        let path = memory.fetch_cstr(user_path)?;
        if user_argv.argc() > MAX_ARG {
            return Err(KernelError::ArgumentListTooLong.into());
        }
        let argv = user_argv.as_slice().validate(memory)?;
        let mut args = Vec::with_capacity(argv.len());
        for i in 0..argv.len() {
            let ptr: u32 = memory.copy_u2k(&argv.nth(i));
            args.push(memory.fetch_cstr(UserCStr::from_addr(ptr as usize))?);
        }

        let pid = ops::spawn(core, Some(p.pid()), &path, args)?;
        Ok(pid)
    }
}

impl SyscallExt for syscall::Join {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        p: &Proc,
        private: &mut ProcPrivateData,
        (pid, user_status): Self::Arg,
    ) -> Self::Return {
        let mut user_status = user_status.validate(private.memory())?;

        let termination = ops::join(core, p, pid)?;
        private
            .memory_mut()
            .copy_k2u(&mut user_status, &termination.exit_status);
        Ok(termination.join_status())
    }
}

#[derive(Debug)]
pub(super) struct ExitArg(i32);

impl RegisterValue for ExitArg {
    type DecodeError = Infallible;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        unreachable!()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        Ok(i32::try_decode(Register::new(repr.a)).map_or(Self(-1), Self))
    }
}

impl SyscallExt for syscall::Exit {
    type KernelArg = ExitArg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        p: &Proc,
        private: &mut ProcPrivateData,
        ExitArg(status): Self::KernelArg,
    ) -> Self::Return {
        ops::exit(core, p, private, status);
    }
}
