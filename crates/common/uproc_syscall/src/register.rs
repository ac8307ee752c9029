use core::{convert::Infallible, marker::PhantomData, num::NonZero};

use uproc_types::{fs::RawFd, process::ProcId};

use crate::{
    JoinStatus, Register, RegisterDecodeError, RegisterValue, UserArgv, UserCStr, UserMutRef,
    UserMutSlice, UserRef, UserSlice, error::SyscallError,
};

impl<T, const N: usize> Register<T, N> {
    pub const fn new(a: [usize; N]) -> Self {
        Self {
            a,
            _phantom: PhantomData,
        }
    }

    const fn map_type<U>(self) -> Register<U, N> {
        Register {
            a: self.a,
            _phantom: PhantomData,
        }
    }

    pub fn try_decode(self) -> Result<T, T::DecodeError>
    where
        T: RegisterValue<Repr = Self>,
    {
        T::try_decode(self)
    }
}

macro_rules! impl_value {
    ([$($bound:tt)*] $ty:ty, $err:ty, $n:expr, $enc:ident, $dec:ident) => {
        impl<$($bound)*> RegisterValue for $ty {
            type DecodeError = $err;
            type Repr = Register<Self, { $n }>;

            fn encode(self) -> Self::Repr {
                $enc(self)
            }

            fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
                $dec(repr)
            }
        }
    };
}

impl RegisterValue for Infallible {
    type DecodeError = Self;
    type Repr = Register<Self, 0>;

    fn encode(self) -> Self::Repr {
        match self {}
    }

    fn try_decode(_repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        unreachable!()
    }
}

impl RegisterValue for () {
    type DecodeError = Infallible;
    type Repr = Register<(), 0>;

    fn encode(self) -> Self::Repr {
        Register::new([])
    }

    fn try_decode(_: Self::Repr) -> Result<Self, Self::DecodeError> {
        Ok(())
    }
}

impl RegisterValue for usize {
    type DecodeError = Infallible;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        Register::new([self])
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        Ok(repr.a[0])
    }
}

impl RegisterValue for isize {
    type DecodeError = Infallible;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        Register::new([self as usize])
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let [a0] = repr.a;
        Ok(a0 as Self)
    }
}

impl RegisterValue for i32 {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        (self as isize).encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let n: isize = repr.map_type().try_decode()?;
        Ok(n.try_into()?)
    }
}

impl RegisterValue for SyscallError {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        (self as isize).encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let n: isize = repr.map_type().try_decode()?;
        Self::from_repr(n).ok_or(RegisterDecodeError::InvalidSyscallErrorNo(n))
    }
}

impl RegisterValue for ProcId {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        let n = u32::from(self) as usize;
        n.encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let n: isize = repr.map_type().try_decode()?;
        if n <= 0 {
            return Err(RegisterDecodeError::InvalidProcId(n));
        }
        let n = NonZero::new(u32::try_from(n)?).ok_or(RegisterDecodeError::UnexpectedZero)?;
        Ok(Self::new(n))
    }
}

impl RegisterValue for RawFd {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        self.get().encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let n: isize = repr.map_type().try_decode()?;
        let n = usize::try_from(n).map_err(|_| RegisterDecodeError::NegativeFileDescriptor(n))?;
        Ok(Self::new(n))
    }
}

impl RegisterValue for JoinStatus {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        (self as usize).encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let n: usize = repr.map_type().try_decode()?;
        Self::from_repr(n).ok_or(RegisterDecodeError::InvalidJoinStatus(n))
    }
}

fn decode_len(a: usize) -> Result<usize, RegisterDecodeError> {
    let n = a as isize;
    usize::try_from(n).map_err(|_| RegisterDecodeError::NegativeLength(n))
}

impl<T> RegisterValue for UserRef<T>
where
    T: ?Sized,
{
    type DecodeError = Infallible;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        self.addr.encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let addr: usize = repr.map_type().try_decode()?;
        Ok(Self::from_addr(addr))
    }
}

impl<T> RegisterValue for UserMutRef<T>
where
    T: ?Sized,
{
    type DecodeError = Infallible;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        self.addr.encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let addr: usize = repr.map_type().try_decode()?;
        Ok(Self::from_addr(addr))
    }
}

impl<T> RegisterValue for UserSlice<T> {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 2>;

    fn encode(self) -> Self::Repr {
        Self::Repr::new([self.addr, self.len])
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let [addr, len] = repr.a;
        Ok(Self::from_raw_parts(addr, decode_len(len)?))
    }
}

impl<T> RegisterValue for UserMutSlice<T> {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 2>;

    fn encode(self) -> Self::Repr {
        Self::Repr::new([self.addr, self.len])
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let [addr, len] = repr.a;
        Ok(Self::from_raw_parts(addr, decode_len(len)?))
    }
}

impl RegisterValue for UserCStr {
    type DecodeError = Infallible;
    type Repr = Register<Self, 1>;

    fn encode(self) -> Self::Repr {
        self.addr.encode().map_type()
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let addr: usize = repr.map_type().try_decode()?;
        Ok(Self::from_addr(addr))
    }
}

impl RegisterValue for UserArgv {
    type DecodeError = RegisterDecodeError;
    type Repr = Register<Self, 2>;

    fn encode(self) -> Self::Repr {
        Self::Repr::new([self.argc, self.addr])
    }

    fn try_decode(repr: Self::Repr) -> Result<Self, Self::DecodeError> {
        let [argc, addr] = repr.a;
        Ok(Self::new(decode_len(argc)?, addr))
    }
}

fn result_encode_0<E>(res: Result<(), E>) -> Register<Result<(), E>, 1>
where
    E: RegisterValue<Repr = Register<E, 1>>,
{
    match res {
        Ok(()) => Register::new([0]),
        Err(e) => {
            let [code] = e.encode().a;
            Register::new([(code as isize).wrapping_neg() as usize])
        }
    }
}

fn result_decode_0<E>(
    repr: Register<Result<(), E>, 1>,
) -> Result<Result<(), E>, RegisterDecodeError>
where
    E: RegisterValue<Repr = Register<E, 1>>,
    RegisterDecodeError: From<E::DecodeError>,
{
    let [a0] = repr.a;
    match a0 as isize {
        0 => Ok(Ok(())),
        n if n < 0 => {
            let e = Register::<E, 1>::new([n.wrapping_neg() as usize]).try_decode()?;
            Ok(Err(e))
        }
        n => Err(RegisterDecodeError::InvalidSyscallErrorNo(n)),
    }
}

fn result_encode_1<T, E>(res: Result<T, E>) -> Register<Result<T, E>, 1>
where
    T: RegisterValue<Repr = Register<T, 1>>,
    E: RegisterValue<Repr = Register<E, 1>>,
{
    match res {
        Ok(v) => {
            let [a0] = v.encode().a;
            debug_assert!(a0 as isize >= 0, "success value does not fit the return register");
            Register::new([a0])
        }
        Err(e) => {
            let [code] = e.encode().a;
            Register::new([(code as isize).wrapping_neg() as usize])
        }
    }
}

fn result_decode_1<T, E>(
    repr: Register<Result<T, E>, 1>,
) -> Result<Result<T, E>, RegisterDecodeError>
where
    T: RegisterValue<Repr = Register<T, 1>>,
    E: RegisterValue<Repr = Register<E, 1>>,
    RegisterDecodeError: From<T::DecodeError> + From<E::DecodeError>,
{
    let [a0] = repr.a;
    let n = a0 as isize;
    if n < 0 {
        let e = Register::<E, 1>::new([n.wrapping_neg() as usize]).try_decode()?;
        return Ok(Err(e));
    }
    let v = Register::<T, 1>::new([a0]).try_decode()?;
    Ok(Ok(v))
}

fn result_encode_never<E>(res: Result<Infallible, E>) -> Register<Result<Infallible, E>, 1>
where
    E: RegisterValue<Repr = Register<E, 1>>,
{
    let Err(e) = res;
    let [code] = e.encode().a;
    Register::new([(code as isize).wrapping_neg() as usize])
}

fn result_decode_never<E>(
    repr: Register<Result<Infallible, E>, 1>,
) -> Result<Result<Infallible, E>, RegisterDecodeError>
where
    E: RegisterValue<Repr = Register<E, 1>>,
    RegisterDecodeError: From<E::DecodeError>,
{
    let [a0] = repr.a;
    let n = a0 as isize;
    if n >= 0 {
        return Err(RegisterDecodeError::InvalidSyscallErrorNo(n));
    }
    let e = Register::<E, 1>::new([n.wrapping_neg() as usize]).try_decode()?;
    Ok(Err(e))
}

impl_value!([] Result<(), SyscallError>, RegisterDecodeError, 1, result_encode_0, result_decode_0);
impl_value!([] Result<Infallible, SyscallError>, RegisterDecodeError, 1, result_encode_never, result_decode_never);
impl_value!([] Result<usize, SyscallError>, RegisterDecodeError, 1, result_encode_1, result_decode_1);
impl_value!([] Result<ProcId, SyscallError>, RegisterDecodeError, 1, result_encode_1, result_decode_1);
impl_value!([] Result<RawFd, SyscallError>, RegisterDecodeError, 1, result_encode_1, result_decode_1);
impl_value!([] Result<JoinStatus, SyscallError>, RegisterDecodeError, 1, result_encode_1, result_decode_1);

fn tuple1_encode<T, const N: usize>((v0,): (T,)) -> Register<(T,), N>
where
    T: RegisterValue<Repr = Register<T, N>>,
{
    Register::new(v0.encode().a)
}

fn tuple1_decode<T, const N: usize>(repr: Register<(T,), N>) -> Result<(T,), T::DecodeError>
where
    T: RegisterValue<Repr = Register<T, N>>,
{
    let v0 = Register::<T, N>::new(repr.a).try_decode()?;
    Ok((v0,))
}

fn tuple_encode_11<T, U>((v0, v1): (T, U)) -> Register<(T, U), 2>
where
    T: RegisterValue<Repr = Register<T, 1>>,
    U: RegisterValue<Repr = Register<U, 1>>,
{
    let [a0] = v0.encode().a;
    let [a1] = v1.encode().a;
    Register::new([a0, a1])
}

fn tuple_decode_11<T, U, E>(repr: Register<(T, U), 2>) -> Result<(T, U), E>
where
    T: RegisterValue<Repr = Register<T, 1>>,
    U: RegisterValue<Repr = Register<U, 1>>,
    E: From<T::DecodeError> + From<U::DecodeError>,
{
    let [a0, a1] = repr.a;
    let v0 = Register::<T, 1>::new([a0]).try_decode()?;
    let v1 = Register::<U, 1>::new([a1]).try_decode()?;
    Ok((v0, v1))
}

fn tuple_encode_12<T, U>((v0, v1): (T, U)) -> Register<(T, U), 3>
where
    T: RegisterValue<Repr = Register<T, 1>>,
    U: RegisterValue<Repr = Register<U, 2>>,
{
    let [a0] = v0.encode().a;
    let [a1, a2] = v1.encode().a;
    Register::new([a0, a1, a2])
}

fn tuple_decode_12<T, U, E>(repr: Register<(T, U), 3>) -> Result<(T, U), E>
where
    T: RegisterValue<Repr = Register<T, 1>>,
    U: RegisterValue<Repr = Register<U, 2>>,
    E: From<T::DecodeError> + From<U::DecodeError>,
{
    let [a0, a1, a2] = repr.a;
    let v0 = Register::<T, 1>::new([a0]).try_decode()?;
    let v1 = Register::<U, 2>::new([a1, a2]).try_decode()?;
    Ok((v0, v1))
}

impl_value!([](i32,), RegisterDecodeError, 1, tuple1_encode, tuple1_decode);
impl_value!([](RawFd,), RegisterDecodeError, 1, tuple1_encode, tuple1_decode);
impl_value!([](UserCStr,), Infallible, 1, tuple1_encode, tuple1_decode);

impl_value!([T: ?Sized] (ProcId, UserMutRef<T>), RegisterDecodeError, 2, tuple_encode_11, tuple_decode_11);
impl_value!([] (UserCStr, UserArgv), RegisterDecodeError, 3, tuple_encode_12, tuple_decode_12);
impl_value!([T] (RawFd, UserSlice<T>), RegisterDecodeError, 3, tuple_encode_12, tuple_decode_12);
impl_value!([T] (RawFd, UserMutSlice<T>), RegisterDecodeError, 3, tuple_encode_12, tuple_decode_12);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_returned_as_negative_values() {
        let res: Result<usize, SyscallError> = Err(SyscallError::BadFileDescriptor);
        let [a0] = res.encode().a;
        assert_eq!(a0 as isize, -9);
        let decoded = Register::<Result<usize, SyscallError>, 1>::new([a0])
            .try_decode()
            .unwrap();
        assert_eq!(decoded, Err(SyscallError::BadFileDescriptor));
    }

    #[test]
    fn unit_success_is_zero() {
        let res: Result<(), SyscallError> = Ok(());
        assert_eq!(res.encode().a, [0]);
    }

    #[test]
    fn negative_fd_is_rejected() {
        let repr = Register::<(RawFd,), 1>::new([(-1_isize) as usize]);
        assert!(matches!(
            repr.try_decode(),
            Err(RegisterDecodeError::NegativeFileDescriptor(-1))
        ));
    }

    #[test]
    fn negative_length_is_rejected() {
        let repr = Register::<(RawFd, UserMutSlice<u8>), 3>::new([3, 0x1000, (-5_isize) as usize]);
        assert!(matches!(
            repr.try_decode(),
            Err(RegisterDecodeError::NegativeLength(-5))
        ));
    }

    #[test]
    fn non_positive_pid_is_rejected() {
        for n in [0_isize, -1, -100] {
            let repr = Register::<(ProcId, UserMutRef<i32>), 2>::new([n as usize, 0x1000]);
            assert!(repr.try_decode().is_err());
        }
        let repr = Register::<(ProcId, UserMutRef<i32>), 2>::new([7, 0x1000]);
        let (pid, status) = repr.try_decode().unwrap();
        assert_eq!(u32::from(pid), 7);
        assert_eq!(status.addr(), 0x1000);
    }

    #[test]
    fn join_status_encoding() {
        let exited: Result<JoinStatus, SyscallError> = Ok(JoinStatus::Exited);
        let faulted: Result<JoinStatus, SyscallError> = Ok(JoinStatus::Faulted);
        assert_eq!(exited.encode().a, [1]);
        assert_eq!(faulted.encode().a, [0]);
    }
}
