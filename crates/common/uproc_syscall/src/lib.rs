//! System call numbers, argument encoding, and error codes.
//!
//! Every system call takes up to four register-sized arguments and returns a
//! single signed register. A non-negative return value is a success value;
//! a negative return value is the negated [`SyscallError`] code.
#![cfg_attr(not(test), no_std)]

use core::{convert::Infallible, fmt, marker::PhantomData, num::TryFromIntError};

use dataview::Pod;
use strum::{Display, EnumString, FromRepr};

pub mod error;
mod register;
pub mod syscall;

#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr, EnumString, Display)]
#[repr(usize)]
#[strum(serialize_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum SyscallCode {
    Halt = 0,
    Exit,
    Exec,
    Join,
    Creat,
    Open,
    Read,
    Write,
    Close,
    Unlink,
}

pub trait Syscall {
    const CODE: SyscallCode;
    type Arg: RegisterValue;
    type Return: RegisterValue;
}

/// How a joined child terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromRepr)]
#[repr(usize)]
pub enum JoinStatus {
    /// The child was terminated by an unhandled fault; its status is undefined.
    Faulted = 0,
    /// The child called `exit` (or returned from `main`).
    Exited = 1,
}

/// A user address of a value of type `T`.
#[derive(Debug)]
pub struct UserRef<T>
where
    T: ?Sized + 'static,
{
    addr: usize,
    _phantom: PhantomData<&'static T>,
}

impl<T> Clone for UserRef<T>
where
    T: ?Sized,
{
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for UserRef<T> where T: ?Sized {}

impl<T> UserRef<T>
where
    T: ?Sized,
{
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self {
            addr,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[must_use]
    pub const fn size(&self) -> usize
    where
        T: Sized,
    {
        size_of::<T>()
    }

    #[must_use]
    pub fn as_bytes(&self) -> UserSlice<u8>
    where
        T: Pod + Sized,
    {
        UserSlice::from_raw_parts(self.addr, size_of::<T>())
    }
}

/// A writable user address of a value of type `T`.
#[derive(Debug)]
pub struct UserMutRef<T>
where
    T: ?Sized + 'static,
{
    addr: usize,
    _phantom: PhantomData<&'static mut T>,
}

impl<T> UserMutRef<T>
where
    T: ?Sized,
{
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self {
            addr,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[must_use]
    pub const fn size(&self) -> usize
    where
        T: Sized,
    {
        size_of::<T>()
    }

    #[must_use]
    pub fn as_bytes_mut(&mut self) -> UserMutSlice<u8>
    where
        T: Pod + Sized,
    {
        UserMutSlice::from_raw_parts(self.addr, size_of::<T>())
    }
}

/// A user address range of `len` values of type `T`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct UserSlice<T> {
    addr: usize,
    len: usize,
    _phantom: PhantomData<T>,
}

impl<T> UserSlice<T> {
    #[must_use]
    pub const fn from_raw_parts(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[expect(clippy::len_without_is_empty)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the size of the range in bytes, or `None` on overflow.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        size_of::<T>().checked_mul(self.len)
    }

    #[must_use]
    pub const fn nth(&self, n: usize) -> UserRef<T> {
        assert!(n < self.len);
        UserRef::from_addr(self.addr + n * size_of::<T>())
    }

    #[must_use]
    pub const fn skip(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr + amt * size_of::<T>(), self.len - amt)
    }

    #[must_use]
    pub const fn take(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr, amt)
    }
}

/// A writable user address range of `len` values of type `T`.
#[derive(Debug, PartialEq, Eq)]
#[repr(C)]
pub struct UserMutSlice<T> {
    addr: usize,
    len: usize,
    _phantom: PhantomData<T>,
}

impl<T> UserMutSlice<T> {
    #[must_use]
    pub const fn from_raw_parts(addr: usize, len: usize) -> Self {
        Self {
            addr,
            len,
            _phantom: PhantomData,
        }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[expect(clippy::len_without_is_empty)]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    /// Returns the size of the range in bytes, or `None` on overflow.
    #[must_use]
    pub const fn size(&self) -> Option<usize> {
        size_of::<T>().checked_mul(self.len)
    }

    #[must_use]
    pub const fn skip_mut(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr + amt * size_of::<T>(), self.len - amt)
    }

    #[must_use]
    pub const fn take_mut(&self, amt: usize) -> Self {
        assert!(amt <= self.len);
        Self::from_raw_parts(self.addr, amt)
    }
}

/// A user address of a NUL-terminated string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserCStr {
    addr: usize,
}

impl UserCStr {
    #[must_use]
    pub const fn from_addr(addr: usize) -> Self {
        Self { addr }
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }
}

/// An `exec` argument vector: `argc` followed by the address of `argv`.
///
/// `argv` is an array of `argc` user string pointers, each stored as a
/// little-endian `u32`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UserArgv {
    argc: usize,
    addr: usize,
}

impl UserArgv {
    #[must_use]
    pub const fn new(argc: usize, addr: usize) -> Self {
        Self { argc, addr }
    }

    #[must_use]
    pub const fn argc(&self) -> usize {
        self.argc
    }

    #[must_use]
    pub const fn addr(&self) -> usize {
        self.addr
    }

    #[must_use]
    pub const fn as_slice(&self) -> UserSlice<u32> {
        UserSlice::from_raw_parts(self.addr, self.argc)
    }
}

pub type ArgType<T> = <T as Syscall>::Arg;
pub type ArgTypeRepr<T> = <<T as Syscall>::Arg as RegisterValue>::Repr;
pub type ReturnType<T> = <T as Syscall>::Return;
pub type ReturnTypeRepr<T> = <<T as Syscall>::Return as RegisterValue>::Repr;

#[must_use]
#[repr(C)]
#[derive(Debug, PartialEq, Eq)]
pub struct Register<T, const N: usize> {
    pub a: [usize; N],
    _phantom: PhantomData<T>,
}

impl<T, const N: usize> Copy for Register<T, N> {}
impl<T, const N: usize> Clone for Register<T, N> {
    fn clone(&self) -> Self {
        *self
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegisterDecodeError {
    #[error("int conversion: {0}")]
    IntConversion(#[from] TryFromIntError),
    #[error("invalid syscall error number: {0}")]
    InvalidSyscallErrorNo(isize),
    #[error("invalid join status: {0}")]
    InvalidJoinStatus(usize),
    #[error("negative length: {0}")]
    NegativeLength(isize),
    #[error("negative file descriptor: {0}")]
    NegativeFileDescriptor(isize),
    #[error("invalid process id: {0}")]
    InvalidProcId(isize),
    #[error("unexpected zero")]
    UnexpectedZero,
}

impl From<Infallible> for RegisterDecodeError {
    fn from(_: Infallible) -> Self {
        unreachable!()
    }
}

pub trait RegisterValue
where
    Self: Sized,
{
    type DecodeError: fmt::Debug;
    type Repr;

    fn encode(self) -> Self::Repr;
    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError>;
}
