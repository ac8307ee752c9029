//! Open files of a process.

use std::fmt;

use crate::{
    console::Console,
    error::KernelError,
    fs::{FileSystem, OpenFlags, StoreFile},
};

pub use self::table::FileTable;

mod table;

/// A file descriptor table entry.
pub enum File {
    ConsoleInput,
    ConsoleOutput,
    Disk(DiskFile),
}

/// A backing-store file and this descriptor's offset into it.
pub struct DiskFile {
    name: String,
    handle: Box<dyn StoreFile>,
    offset: usize,
}

impl fmt::Debug for File {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConsoleInput => f.write_str("ConsoleInput"),
            Self::ConsoleOutput => f.write_str("ConsoleOutput"),
            Self::Disk(disk) => f
                .debug_struct("Disk")
                .field("name", &disk.name)
                .field("offset", &disk.offset)
                .finish_non_exhaustive(),
        }
    }
}

impl File {
    /// Opens `name` in the backing store.
    pub fn open(fs: &dyn FileSystem, name: &str, flags: OpenFlags) -> Result<Self, KernelError> {
        let handle = fs.open(name, flags)?;
        Ok(Self::Disk(DiskFile {
            name: name.to_owned(),
            handle,
            offset: 0,
        }))
    }

    /// Reads into `buf`.
    ///
    /// Console reads sleep until input is available. Disk reads return 0 at
    /// end of file and advance the offset by the number of bytes read.
    pub fn read(&mut self, console: &Console, buf: &mut [u8]) -> Result<usize, KernelError> {
        match self {
            Self::ConsoleInput => Ok(console.read(buf)),
            Self::ConsoleOutput => Err(KernelError::NotReadable),
            Self::Disk(disk) => {
                let n = disk.handle.read_at(disk.offset, buf)?;
                disk.offset += n;
                Ok(n)
            }
        }
    }

    /// Writes `buf`.
    ///
    /// Disk writes are short only when the backing store is full; a write
    /// that cannot store a single byte fails.
    pub fn write(&mut self, console: &Console, buf: &[u8]) -> Result<usize, KernelError> {
        match self {
            Self::ConsoleInput => Err(KernelError::NotWritable),
            Self::ConsoleOutput => Ok(console.write(buf)),
            Self::Disk(disk) => {
                let n = disk.handle.write_at(disk.offset, buf)?;
                if n == 0 && !buf.is_empty() {
                    return Err(KernelError::StorageFull);
                }
                disk.offset += n;
                Ok(n)
            }
        }
    }

    /// Releases the entry, flushing disk state.
    pub fn close(self) -> Result<(), KernelError> {
        match self {
            Self::ConsoleInput | Self::ConsoleOutput => Ok(()),
            Self::Disk(disk) => disk.handle.flush(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync;

    use super::*;
    use crate::fs::{MemFs, MemFsData};

    #[test]
    fn descriptors_keep_independent_offsets() {
        let fs = MemFs::<sync::Mutex<MemFsData>>::new(1024);
        let console = Console::new(false);
        fs.insert("a.txt", b"0123456789").unwrap();

        let mut f1 = File::open(&fs, "a.txt", OpenFlags::CREATE).unwrap();
        let mut f2 = File::open(&fs, "a.txt", OpenFlags::CREATE).unwrap();
        let mut buf = [0; 4];
        assert_eq!(f1.read(&console, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(f1.read(&console, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"4567");
        assert_eq!(f2.read(&console, &mut buf).unwrap(), 4);
        assert_eq!(&buf, b"0123");
        assert_eq!(f1.read(&console, &mut buf).unwrap(), 2);
        assert_eq!(f1.read(&console, &mut buf).unwrap(), 0);
        f1.close().unwrap();
        f2.close().unwrap();
    }

    #[test]
    fn console_streams_are_one_way() {
        let console = Console::new(false);
        let mut input = File::ConsoleInput;
        let mut output = File::ConsoleOutput;
        assert!(matches!(
            input.write(&console, b"x"),
            Err(KernelError::NotWritable)
        ));
        assert!(matches!(
            output.read(&console, &mut [0; 1]),
            Err(KernelError::NotReadable)
        ));
        assert_eq!(output.write(&console, b"hi").unwrap(), 2);
        assert_eq!(console.take_output(), b"hi");
    }

    #[test]
    fn full_store_fails_write() {
        let fs = MemFs::<sync::Mutex<MemFsData>>::new(4);
        let console = Console::new(false);
        let mut file = File::open(&fs, "a.txt", OpenFlags::CREATE).unwrap();
        assert_eq!(file.write(&console, b"abcdef").unwrap(), 4);
        assert!(matches!(
            file.write(&console, b"g"),
            Err(KernelError::StorageFull)
        ));
        assert_eq!(file.write(&console, b"").unwrap(), 0);
    }
}
