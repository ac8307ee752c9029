//! Backing store.
//!
//! Files are named byte sequences with positional access. The kernel only
//! talks to the store through [`FileSystem`] and [`StoreFile`]; [`MemFs`] is
//! the in-memory implementation a kernel boots with.

use std::{collections::BTreeMap, fmt, sync::Arc};

use bitflags::bitflags;
use mutex_api::Mutex;
use uproc_kernel_params::MAX_STRING_LENGTH;

use crate::{error::KernelError, sync::SleepLock};

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpenFlags: u8 {
        /// Create the file if it does not exist.
        const CREATE = 1 << 0;
        /// Truncate the file to length 0.
        const TRUNC = 1 << 1;
    }
}

/// An open file of the backing store.
pub trait StoreFile: Send {
    /// Reads bytes starting at `offset`. Returns 0 at or past the end.
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, KernelError>;

    /// Writes bytes starting at `offset`, extending the file if needed.
    ///
    /// Returns the number of bytes written, which is less than `buf.len()`
    /// only when the store is out of space.
    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, KernelError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn flush(&self) -> Result<(), KernelError>;
}

pub trait FileSystem: Send + Sync {
    fn open(&self, name: &str, flags: OpenFlags) -> Result<Box<dyn StoreFile>, KernelError>;

    /// Removes `name`.
    ///
    /// Files that are still open keep their contents until the last handle
    /// is dropped.
    fn remove(&self, name: &str) -> Result<(), KernelError>;
}

fn validate_name(name: &str) -> Result<(), KernelError> {
    if name.is_empty() || name.len() >= MAX_STRING_LENGTH || name.contains(['/', '\0']) {
        return Err(KernelError::InvalidFileName);
    }
    Ok(())
}

type InodeNo = u64;

struct MemInode {
    data: Vec<u8>,
    open_count: usize,
    linked: bool,
}

pub struct MemFsData {
    names: BTreeMap<String, InodeNo>,
    inodes: BTreeMap<InodeNo, MemInode>,
    next_ino: InodeNo,
    capacity: usize,
    used: usize,
}

impl MemFsData {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            names: BTreeMap::new(),
            inodes: BTreeMap::new(),
            next_ino: 1,
            capacity,
            used: 0,
        }
    }

    fn create(&mut self, name: &str) -> InodeNo {
        let ino = self.next_ino;
        self.next_ino += 1;
        self.inodes.insert(
            ino,
            MemInode {
                data: Vec::new(),
                open_count: 0,
                linked: true,
            },
        );
        self.names.insert(name.to_owned(), ino);
        ino
    }

    fn truncate(&mut self, ino: InodeNo) {
        if let Some(inode) = self.inodes.get_mut(&ino) {
            self.used -= inode.data.len();
            inode.data.clear();
        }
    }

    fn release_if_unused(&mut self, ino: InodeNo) {
        let unused = self
            .inodes
            .get(&ino)
            .is_some_and(|inode| !inode.linked && inode.open_count == 0);
        if unused {
            if let Some(inode) = self.inodes.remove(&ino) {
                self.used -= inode.data.len();
            }
        }
    }
}

impl fmt::Debug for MemFsData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemFsData")
            .field("names", &self.names)
            .field("inodes", &self.inodes.len())
            .field("capacity", &self.capacity)
            .field("used", &self.used)
            .finish_non_exhaustive()
    }
}

/// In-memory backing store with a byte capacity.
pub struct MemFs<M>
where
    M: Mutex<Data = MemFsData>,
{
    data: Arc<M>,
}

/// The backing store type a kernel boots with.
pub type KernelFs = MemFs<SleepLock<MemFsData>>;

impl<M> Clone for MemFs<M>
where
    M: Mutex<Data = MemFsData>,
{
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl<M> MemFs<M>
where
    M: Mutex<Data = MemFsData>,
{
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            data: Arc::new(M::new(MemFsData::new(capacity))),
        }
    }

    /// Creates or replaces `name` with `contents`.
    pub fn insert(&self, name: &str, contents: &[u8]) -> Result<(), KernelError> {
        validate_name(name)?;
        let mut data = self.data.lock();
        let existing = data.names.get(name).copied();
        let old_len = existing
            .and_then(|ino| data.inodes.get(&ino))
            .map_or(0, |inode| inode.data.len());
        if data.capacity - (data.used - old_len) < contents.len() {
            return Err(KernelError::StorageFull);
        }
        let ino = existing.unwrap_or_else(|| data.create(name));
        data.truncate(ino);
        data.used += contents.len();
        if let Some(inode) = data.inodes.get_mut(&ino) {
            inode.data.extend_from_slice(contents);
        }
        Ok(())
    }

    /// Returns the contents of `name`, if it exists.
    #[must_use]
    pub fn contents(&self, name: &str) -> Option<Vec<u8>> {
        let data = self.data.lock();
        let ino = data.names.get(name)?;
        data.inodes.get(ino).map(|inode| inode.data.clone())
    }

    #[must_use]
    pub fn exists(&self, name: &str) -> bool {
        self.data.lock().names.contains_key(name)
    }

    /// Returns the number of bytes in use, including unlinked files that are
    /// still open.
    #[must_use]
    pub fn used(&self) -> usize {
        self.data.lock().used
    }
}

impl<M> FileSystem for MemFs<M>
where
    M: Mutex<Data = MemFsData> + Send + Sync + 'static,
{
    fn open(&self, name: &str, flags: OpenFlags) -> Result<Box<dyn StoreFile>, KernelError> {
        validate_name(name)?;
        let mut data = self.data.lock();
        let ino = match data.names.get(name) {
            Some(ino) => *ino,
            None if flags.contains(OpenFlags::CREATE) => data.create(name),
            None => return Err(KernelError::FsEntryNotFound),
        };
        if flags.contains(OpenFlags::TRUNC) {
            data.truncate(ino);
        }
        let Some(inode) = data.inodes.get_mut(&ino) else {
            return Err(KernelError::FsEntryNotFound);
        };
        inode.open_count += 1;
        drop(data);

        Ok(Box::new(MemFile {
            fs: Arc::clone(&self.data),
            ino,
        }))
    }

    fn remove(&self, name: &str) -> Result<(), KernelError> {
        validate_name(name)?;
        let mut data = self.data.lock();
        let ino = data.names.remove(name).ok_or(KernelError::FsEntryNotFound)?;
        if let Some(inode) = data.inodes.get_mut(&ino) {
            inode.linked = false;
        }
        data.release_if_unused(ino);
        Ok(())
    }
}

struct MemFile<M>
where
    M: Mutex<Data = MemFsData>,
{
    fs: Arc<M>,
    ino: InodeNo,
}

impl<M> StoreFile for MemFile<M>
where
    M: Mutex<Data = MemFsData> + Send + Sync,
{
    fn read_at(&self, offset: usize, buf: &mut [u8]) -> Result<usize, KernelError> {
        let data = self.fs.lock();
        let inode = data
            .inodes
            .get(&self.ino)
            .ok_or(KernelError::FsEntryNotFound)?;
        let Some(src) = inode.data.get(offset..) else {
            return Ok(0);
        };
        let n = usize::min(buf.len(), src.len());
        buf[..n].copy_from_slice(&src[..n]);
        Ok(n)
    }

    fn write_at(&self, offset: usize, buf: &[u8]) -> Result<usize, KernelError> {
        let mut data = self.fs.lock();
        let available = data.capacity - data.used;
        let inode = data
            .inodes
            .get_mut(&self.ino)
            .ok_or(KernelError::FsEntryNotFound)?;
        let len = inode.data.len();
        let limit = len.saturating_add(available);
        let n = usize::min(buf.len(), limit.saturating_sub(offset));
        if n == 0 {
            return Ok(0);
        }
        let end = offset + n;
        if end > len {
            inode.data.resize(end, 0);
        }
        inode.data[offset..end].copy_from_slice(&buf[..n]);
        let grown = inode.data.len() - len;
        data.used += grown;
        Ok(n)
    }

    fn len(&self) -> usize {
        let data = self.fs.lock();
        data.inodes
            .get(&self.ino)
            .map_or(0, |inode| inode.data.len())
    }

    fn flush(&self) -> Result<(), KernelError> {
        Ok(())
    }
}

impl<M> Drop for MemFile<M>
where
    M: Mutex<Data = MemFsData>,
{
    fn drop(&mut self) {
        let mut data = self.fs.lock();
        if let Some(inode) = data.inodes.get_mut(&self.ino) {
            inode.open_count -= 1;
        }
        data.release_if_unused(self.ino);
    }
}

#[cfg(test)]
mod tests {
    use std::sync;

    use super::*;

    type TestFs = MemFs<sync::Mutex<MemFsData>>;

    #[test]
    fn open_requires_create_flag() {
        let fs = TestFs::new(1024);
        assert!(matches!(
            fs.open("a.txt", OpenFlags::empty()),
            Err(KernelError::FsEntryNotFound)
        ));
        let file = fs.open("a.txt", OpenFlags::CREATE).unwrap();
        assert!(file.is_empty());
        assert!(fs.exists("a.txt"));
    }

    #[test]
    fn positional_io() {
        let fs = TestFs::new(1024);
        let file = fs.open("a.txt", OpenFlags::CREATE).unwrap();
        assert_eq!(file.write_at(0, b"hello").unwrap(), 5);
        assert_eq!(file.write_at(3, b"p!").unwrap(), 2);
        let mut buf = [0; 8];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"help!");
        assert_eq!(file.read_at(5, &mut buf).unwrap(), 0);
        assert_eq!(file.read_at(100, &mut buf).unwrap(), 0);
        // writing past the end fills the gap with zeroes
        assert_eq!(file.write_at(7, b"x").unwrap(), 1);
        assert_eq!(fs.contents("a.txt").unwrap(), b"help!\0\0x");
    }

    #[test]
    fn truncate_on_open() {
        let fs = TestFs::new(1024);
        fs.insert("a.txt", b"contents").unwrap();
        let file = fs.open("a.txt", OpenFlags::CREATE).unwrap();
        assert_eq!(file.len(), 8);
        drop(file);
        let file = fs.open("a.txt", OpenFlags::CREATE | OpenFlags::TRUNC).unwrap();
        assert_eq!(file.len(), 0);
        assert_eq!(fs.used(), 0);
    }

    #[test]
    fn short_write_when_full() {
        let fs = TestFs::new(8);
        let file = fs.open("a.txt", OpenFlags::CREATE).unwrap();
        assert_eq!(file.write_at(0, b"0123456789").unwrap(), 8);
        assert_eq!(file.write_at(8, b"x").unwrap(), 0);
        // overwriting existing bytes needs no space
        assert_eq!(file.write_at(0, b"ab").unwrap(), 2);
        assert_eq!(fs.contents("a.txt").unwrap(), b"ab234567");
    }

    #[test]
    fn failed_insert_keeps_old_contents() {
        let fs = TestFs::new(8);
        fs.insert("a.txt", b"abcd").unwrap();
        assert!(matches!(
            fs.insert("a.txt", b"012345678"),
            Err(KernelError::StorageFull)
        ));
        assert_eq!(fs.contents("a.txt").unwrap(), b"abcd");
        assert!(matches!(
            fs.insert("b.txt", b"01234"),
            Err(KernelError::StorageFull)
        ));
        assert!(!fs.exists("b.txt"));
        // replacing a file may reuse its own bytes
        fs.insert("a.txt", b"01234567").unwrap();
        assert_eq!(fs.used(), 8);
    }

    #[test]
    fn unlinked_file_lives_until_closed() {
        let fs = TestFs::new(1024);
        fs.insert("a.txt", b"data").unwrap();
        let file = fs.open("a.txt", OpenFlags::empty()).unwrap();
        fs.remove("a.txt").unwrap();
        assert!(!fs.exists("a.txt"));
        assert!(matches!(
            fs.remove("a.txt"),
            Err(KernelError::FsEntryNotFound)
        ));

        let mut buf = [0; 4];
        assert_eq!(file.read_at(0, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"data");
        assert_eq!(fs.used(), 4);
        drop(file);
        assert_eq!(fs.used(), 0);

        // the name can be reused for a new, empty file
        let file = fs.open("a.txt", OpenFlags::CREATE).unwrap();
        assert!(file.is_empty());
    }

    #[test]
    fn invalid_names() {
        let fs = TestFs::new(1024);
        for name in ["", "a/b", "/abs"] {
            assert!(matches!(
                fs.open(name, OpenFlags::CREATE),
                Err(KernelError::InvalidFileName)
            ));
        }
        let long = "x".repeat(MAX_STRING_LENGTH);
        assert!(fs.open(&long, OpenFlags::CREATE).is_err());
        let longest = "x".repeat(MAX_STRING_LENGTH - 1);
        assert!(fs.open(&longest, OpenFlags::CREATE).is_ok());
    }
}
