//! User address spaces.
//!
//! Each process owns a page-granular byte array. Layout, from address 0:
//!
//! | pages                | access     |
//! |----------------------|------------|
//! | 1 guard page         | unmapped   |
//! | text                 | read-only  |
//! | data                 | read-write |
//! | `STACK_PAGES` stack  | read-write |
//!
//! Every address at or beyond [`UserMemory::size`] is unmapped.

use std::ops::Range;

use bitflags::bitflags;
use dataview::{Pod, PodMethods as _};
use uproc_kernel_params::{MAX_STRING_LENGTH, PAGE_SIZE, STACK_PAGES};
use uproc_syscall::{UserCStr, UserMutRef, UserMutSlice, UserRef, UserSlice};

use crate::error::KernelError;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct PtEntryFlags: u8 {
        const R = 1 << 0;
        const W = 1 << 1;
        const RW = Self::R.bits() | Self::W.bits();
    }
}

struct Page {
    flags: PtEntryFlags,
    data: Box<[u8; PAGE_SIZE]>,
}

impl Page {
    fn new(flags: PtEntryFlags) -> Self {
        Self {
            flags,
            data: Box::new([0; PAGE_SIZE]),
        }
    }
}

pub struct UserMemory {
    pages: Vec<Option<Page>>,
    text_pages: usize,
    data_pages: usize,
}

const fn page_index(addr: usize) -> usize {
    addr / PAGE_SIZE
}

const fn page_offset(addr: usize) -> usize {
    addr % PAGE_SIZE
}

impl UserMemory {
    /// Creates an address space with the given number of text and data pages.
    ///
    /// All pages are zero-filled.
    #[must_use]
    pub fn new(text_pages: usize, data_pages: usize) -> Self {
        let mut pages = Vec::with_capacity(1 + text_pages + data_pages + STACK_PAGES);
        pages.push(None);
        pages.extend((0..text_pages).map(|_| Some(Page::new(PtEntryFlags::R))));
        pages.extend((0..data_pages + STACK_PAGES).map(|_| Some(Page::new(PtEntryFlags::RW))));
        Self {
            pages,
            text_pages,
            data_pages,
        }
    }

    /// Returns the size of the address space in bytes.
    #[must_use]
    pub fn size(&self) -> usize {
        self.pages.len() * PAGE_SIZE
    }

    #[must_use]
    pub fn text_range(&self) -> Range<usize> {
        let start = PAGE_SIZE;
        start..start + self.text_pages * PAGE_SIZE
    }

    #[must_use]
    pub fn data_range(&self) -> Range<usize> {
        let start = self.text_range().end;
        start..start + self.data_pages * PAGE_SIZE
    }

    #[must_use]
    pub fn stack_range(&self) -> Range<usize> {
        self.data_range().end..self.size()
    }

    fn validate(&self, addr: usize, len: usize, flags: PtEntryFlags) -> Result<(), KernelError> {
        if len == 0 {
            return Ok(());
        }
        let end = addr
            .checked_add(len)
            .filter(|end| *end <= self.size())
            .ok_or(KernelError::BadAddress { addr, len })?;
        for idx in page_index(addr)..=page_index(end - 1) {
            match &self.pages[idx] {
                Some(page) if page.flags.contains(flags) => {}
                _ => return Err(KernelError::BadAddress { addr, len }),
            }
        }
        Ok(())
    }

    pub fn validate_read(&self, addr: usize, len: usize) -> Result<(), KernelError> {
        self.validate(addr, len, PtEntryFlags::R)
    }

    pub fn validate_write(&self, addr: usize, len: usize) -> Result<(), KernelError> {
        self.validate(addr, len, PtEntryFlags::W)
    }

    /// Returns the bytes from `addr` to the end of its page.
    fn fetch_chunk(&self, addr: usize, flags: PtEntryFlags) -> Result<&[u8], KernelError> {
        match self.pages.get(page_index(addr)) {
            Some(Some(page)) if page.flags.contains(flags) => {
                Ok(&page.data[page_offset(addr)..])
            }
            _ => Err(KernelError::BadAddress { addr, len: 1 }),
        }
    }

    fn fetch_chunk_mut(
        &mut self,
        addr: usize,
        flags: PtEntryFlags,
    ) -> Result<&mut [u8], KernelError> {
        match self.pages.get_mut(page_index(addr)) {
            Some(Some(page)) if page.flags.contains(flags) => {
                Ok(&mut page.data[page_offset(addr)..])
            }
            _ => Err(KernelError::BadAddress { addr, len: 1 }),
        }
    }

    fn read_bytes(&self, mut addr: usize, mut dst: &mut [u8]) -> Result<(), KernelError> {
        while !dst.is_empty() {
            let chunk = self.fetch_chunk(addr, PtEntryFlags::R)?;
            let n = usize::min(dst.len(), chunk.len());
            dst[..n].copy_from_slice(&chunk[..n]);
            dst = &mut dst[n..];
            addr += n;
        }
        Ok(())
    }

    fn write_bytes(&mut self, mut addr: usize, mut src: &[u8]) -> Result<(), KernelError> {
        while !src.is_empty() {
            let chunk = self.fetch_chunk_mut(addr, PtEntryFlags::W)?;
            let n = usize::min(src.len(), chunk.len());
            chunk[..n].copy_from_slice(&src[..n]);
            src = &src[n..];
            addr += n;
        }
        Ok(())
    }

    /// Copies from user to kernel.
    pub fn copy_u2k_bytes(&self, dst: &mut [u8], src: &Validated<UserSlice<u8>>) {
        assert_eq!(src.len(), dst.len());
        if let Err(e) = self.read_bytes(src.addr(), dst) {
            unreachable!("validated range became inaccessible: {e}");
        }
    }

    /// Copies from user to kernel.
    pub fn copy_u2k<T>(&self, src: &Validated<UserRef<T>>) -> T
    where
        T: Pod,
    {
        let mut dst = T::zeroed();
        self.copy_u2k_bytes(dst.as_bytes_mut(), &src.as_bytes());
        dst
    }

    /// Copies from kernel to user.
    pub fn copy_k2u_bytes(&mut self, dst: &mut Validated<UserMutSlice<u8>>, src: &[u8]) {
        assert_eq!(dst.len(), src.len());
        if let Err(e) = self.write_bytes(dst.addr(), src) {
            unreachable!("validated range became inaccessible: {e}");
        }
    }

    /// Copies from kernel to user.
    pub fn copy_k2u<T>(&mut self, dst: &mut Validated<UserMutRef<T>>, src: &T)
    where
        T: Pod,
    {
        self.copy_k2u_bytes(&mut dst.as_bytes_mut(), src.as_bytes());
    }

    /// Reads a NUL-terminated string of at most `MAX_STRING_LENGTH` bytes
    /// (terminator included).
    pub fn fetch_cstr(&self, s: UserCStr) -> Result<String, KernelError> {
        let mut bytes = Vec::new();
        let mut addr = s.addr();
        loop {
            let remaining = MAX_STRING_LENGTH - bytes.len();
            if remaining == 0 {
                return Err(KernelError::UnterminatedString);
            }
            let chunk = self.fetch_chunk(addr, PtEntryFlags::R)?;
            let chunk = &chunk[..usize::min(chunk.len(), remaining)];
            if let Some(nul) = memchr::memchr(0, chunk) {
                bytes.extend_from_slice(&chunk[..nul]);
                break;
            }
            bytes.extend_from_slice(chunk);
            addr += chunk.len();
        }
        if bytes.is_empty() {
            return Err(KernelError::EmptyString);
        }
        String::from_utf8(bytes).map_err(|_| KernelError::NonUtf8String)
    }

    /// Reads user memory on behalf of the program itself.
    pub fn load(&self, addr: usize, dst: &mut [u8]) -> Result<(), KernelError> {
        let src = UserSlice::from_raw_parts(addr, dst.len()).validate(self)?;
        self.copy_u2k_bytes(dst, &src);
        Ok(())
    }

    /// Writes user memory on behalf of the program itself.
    pub fn store(&mut self, addr: usize, src: &[u8]) -> Result<(), KernelError> {
        let mut dst = UserMutSlice::from_raw_parts(addr, src.len()).validate(self)?;
        self.copy_k2u_bytes(&mut dst, src);
        Ok(())
    }
}

/// A user pointer whose whole range was checked against the owning address
/// space.
#[derive(Debug)]
#[repr(transparent)]
pub struct Validated<T>(T);

pub trait Validate: Sized {
    fn validate(self, mem: &UserMemory) -> Result<Validated<Self>, KernelError>;
}

impl<T> Validate for UserRef<T> {
    fn validate(self, mem: &UserMemory) -> Result<Validated<Self>, KernelError> {
        mem.validate_read(self.addr(), self.size())?;
        Ok(Validated(self))
    }
}

impl<T> Validate for UserMutRef<T> {
    fn validate(self, mem: &UserMemory) -> Result<Validated<Self>, KernelError> {
        mem.validate_write(self.addr(), self.size())?;
        Ok(Validated(self))
    }
}

impl<T> Validate for UserSlice<T> {
    fn validate(self, mem: &UserMemory) -> Result<Validated<Self>, KernelError> {
        let len = self.size().ok_or(KernelError::BadAddress {
            addr: self.addr(),
            len: usize::MAX,
        })?;
        mem.validate_read(self.addr(), len)?;
        Ok(Validated(self))
    }
}

impl<T> Validate for UserMutSlice<T> {
    fn validate(self, mem: &UserMemory) -> Result<Validated<Self>, KernelError> {
        let len = self.size().ok_or(KernelError::BadAddress {
            addr: self.addr(),
            len: usize::MAX,
        })?;
        mem.validate_write(self.addr(), len)?;
        Ok(Validated(self))
    }
}

impl<T> Validated<UserRef<T>> {
    pub fn as_bytes(&self) -> Validated<UserSlice<u8>>
    where
        T: Pod,
    {
        Validated(self.0.as_bytes())
    }
}

impl<T> Validated<UserMutRef<T>> {
    pub fn as_bytes_mut(&mut self) -> Validated<UserMutSlice<u8>>
    where
        T: Pod,
    {
        Validated(self.0.as_bytes_mut())
    }
}

impl<T> Validated<UserSlice<T>> {
    pub fn addr(&self) -> usize {
        self.0.addr()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[track_caller]
    pub fn nth(&self, n: usize) -> Validated<UserRef<T>> {
        Validated(self.0.nth(n))
    }
}

impl<T> Validated<UserMutSlice<T>> {
    pub fn addr(&self) -> usize {
        self.0.addr()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[track_caller]
    pub fn take_mut(&mut self, amt: usize) -> Self {
        Self(self.0.take_mut(amt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_page_is_unmapped() {
        let mem = UserMemory::new(1, 1);
        assert!(mem.validate_read(0, 1).is_err());
        assert!(mem.validate_write(0, 10).is_err());
        assert!(UserMutSlice::<u8>::from_raw_parts(0, 10).validate(&mem).is_err());
        // an empty range never touches memory
        assert!(UserMutSlice::<u8>::from_raw_parts(0, 0).validate(&mem).is_ok());
    }

    #[test]
    fn text_is_read_only() {
        let mem = UserMemory::new(2, 1);
        let text = mem.text_range();
        assert!(mem.validate_read(text.start, text.len()).is_ok());
        assert!(mem.validate_write(text.start, 1).is_err());
        let data = mem.data_range();
        assert!(mem.validate_write(data.start, data.len()).is_ok());
    }

    #[test]
    fn ranges_past_the_end_fail() {
        let mem = UserMemory::new(1, 1);
        let size = mem.size();
        assert!(mem.validate_read(size - 1, 1).is_ok());
        assert!(mem.validate_read(size - 1, 2).is_err());
        assert!(mem.validate_read(usize::MAX, 2).is_err());
    }

    #[test]
    fn copy_across_pages() {
        let mut mem = UserMemory::new(0, 2);
        let addr = mem.data_range().start + PAGE_SIZE - 3;
        mem.store(addr, b"abcdefg").unwrap();
        let mut buf = [0; 7];
        mem.load(addr, &mut buf).unwrap();
        assert_eq!(&buf, b"abcdefg");
    }

    #[test]
    fn typed_copy() {
        let mut mem = UserMemory::new(0, 1);
        let addr = mem.data_range().start;
        let mut dst = UserMutRef::<i32>::from_addr(addr).validate(&mem).unwrap();
        mem.copy_k2u(&mut dst, &-42);
        let src = UserRef::<i32>::from_addr(addr).validate(&mem).unwrap();
        assert_eq!(mem.copy_u2k(&src), -42);
    }

    #[test]
    fn fetch_cstr_rules() {
        let mut mem = UserMemory::new(0, 1);
        let addr = mem.data_range().start;
        mem.store(addr, b"hello.coff\0").unwrap();
        assert_eq!(mem.fetch_cstr(UserCStr::from_addr(addr)).unwrap(), "hello.coff");

        mem.store(addr, b"\0").unwrap();
        assert!(matches!(
            mem.fetch_cstr(UserCStr::from_addr(addr)),
            Err(KernelError::EmptyString)
        ));

        mem.store(addr, &[b'x'; MAX_STRING_LENGTH]).unwrap();
        assert!(matches!(
            mem.fetch_cstr(UserCStr::from_addr(addr)),
            Err(KernelError::UnterminatedString)
        ));

        mem.store(addr, &[0xff, 0xfe, 0]).unwrap();
        assert!(matches!(
            mem.fetch_cstr(UserCStr::from_addr(addr)),
            Err(KernelError::NonUtf8String)
        ));

        assert!(matches!(
            mem.fetch_cstr(UserCStr::from_addr(0)),
            Err(KernelError::BadAddress { .. })
        ));
    }

    #[test]
    fn longest_string_fits() {
        let mut mem = UserMemory::new(0, 1);
        let addr = mem.data_range().start;
        let mut s = vec![b'a'; MAX_STRING_LENGTH - 1];
        s.push(0);
        mem.store(addr, &s).unwrap();
        let fetched = mem.fetch_cstr(UserCStr::from_addr(addr)).unwrap();
        assert_eq!(fetched.len(), MAX_STRING_LENGTH - 1);
    }
}
