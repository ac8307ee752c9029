use std::sync::Arc;

use uproc_syscall::{UserCStr, syscall};
use uproc_types::fs::RawFd;

use super::SyscallExt;
use crate::{
    error::KernelError,
    file::File,
    fs::{FileSystem as _, OpenFlags},
    kernel::KernelCore,
    memory::Validate as _,
    proc::{Proc, ProcPrivateData},
};

fn open_file(
    core: &KernelCore,
    private: &mut ProcPrivateData,
    user_name: UserCStr,
    flags: OpenFlags,
) -> Result<RawFd, KernelError> {
    let name = private.memory().fetch_cstr(user_name)?;
    // A full table must not create or truncate the file.
    if !private.ofile().has_free_slot() {
        return Err(KernelError::TooManyOpenFiles);
    }
    let file = File::open(&core.fs, &name, flags)?;
    private.ofile_mut().add(file)
}

impl SyscallExt for syscall::Creat {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        _p: &Proc,
        private: &mut ProcPrivateData,
        (user_name,): Self::Arg,
    ) -> Self::Return {
        let fd = open_file(core, private, user_name, OpenFlags::CREATE | OpenFlags::TRUNC)?;
        Ok(fd)
    }
}

impl SyscallExt for syscall::Open {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        _p: &Proc,
        private: &mut ProcPrivateData,
        (user_name,): Self::Arg,
    ) -> Self::Return {
        let fd = open_file(core, private, user_name, OpenFlags::CREATE)?;
        Ok(fd)
    }
}

impl SyscallExt for syscall::Read {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        _p: &Proc,
        private: &mut ProcPrivateData,
        (fd, data): Self::Arg,
    ) -> Self::Return {
        let mut data = data.validate(private.memory())?;
        let (memory, ofile) = private.split_mut();
        let file = ofile.get_mut(fd)?;

        let mut buf = vec![0; data.len()];
        let n = file.read(&core.console, &mut buf)?;
        memory.copy_k2u_bytes(&mut data.take_mut(n), &buf[..n]);
        Ok(n)
    }
}

impl SyscallExt for syscall::Write {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        _p: &Proc,
        private: &mut ProcPrivateData,
        (fd, data): Self::Arg,
    ) -> Self::Return {
        let data = data.validate(private.memory())?;
        let (memory, ofile) = private.split_mut();
        let file = ofile.get_mut(fd)?;

        let mut buf = vec![0; data.len()];
        memory.copy_u2k_bytes(&mut buf, &data);
        let n = file.write(&core.console, &buf)?;
        Ok(n)
    }
}

impl SyscallExt for syscall::Close {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        _core: &Arc<KernelCore>,
        _p: &Proc,
        private: &mut ProcPrivateData,
        (fd,): Self::Arg,
    ) -> Self::Return {
        let file = private.ofile_mut().remove(fd)?;
        file.close()?;
        Ok(())
    }
}

impl SyscallExt for syscall::Unlink {
    type KernelArg = Self::Arg;
    type KernelReturn = Self::Return;

    fn call(
        core: &Arc<KernelCore>,
        _p: &Proc,
        private: &mut ProcPrivateData,
        (user_name,): Self::Arg,
    ) -> Self::Return {
        let name = private.memory().fetch_cstr(user_name)?;
        core.fs.remove(&name)?;
        Ok(())
    }
}
